//! Retransmission of handshake flights.
//!
//! A flight is the unit of retransmission: all records the peer must see
//! before it can respond, pre-serialized into datagrams. Retransmission
//! resends those exact bytes, epochs and sequence numbers included.

use std::time::{Duration, Instant};

use crate::rng::SeededRng;
use crate::timer::ExponentialBackoff;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum FlightTimeout {
    /// Not due yet, or this flight has no timer.
    Pending,
    /// Resend the flight's datagrams.
    Retransmit,
    /// Retries exhausted. The handshake is over.
    GiveUp,
}

pub(crate) struct Flight {
    datagrams: Vec<Vec<u8>>,
    backoff: Option<ExponentialBackoff>,
    next_retransmit: Option<Instant>,
}

impl Flight {
    /// A flight that retransmits on timeout until retries run out.
    pub fn new(
        datagrams: Vec<Vec<u8>>,
        now: Instant,
        start_rto: Duration,
        retries: usize,
        rng: &mut SeededRng,
    ) -> Flight {
        let backoff = ExponentialBackoff::new(start_rto, retries, rng);
        let next_retransmit = Some(now + backoff.rto());
        Flight {
            datagrams,
            backoff: Some(backoff),
            next_retransmit,
        }
    }

    /// The last flight of a server handshake. It is only ever resent in
    /// response to a retransmitted client Finished, never on a timer.
    pub fn without_timer(datagrams: Vec<Vec<u8>>) -> Flight {
        Flight {
            datagrams,
            backoff: None,
            next_retransmit: None,
        }
    }

    pub fn datagrams(&self) -> &[Vec<u8>] {
        &self.datagrams
    }

    /// When `handle_timeout` next needs to run for this flight.
    pub fn poll_timeout(&self) -> Option<Instant> {
        self.next_retransmit
    }

    pub fn handle_timeout(&mut self, now: Instant, rng: &mut SeededRng) -> FlightTimeout {
        let (Some(next), Some(backoff)) = (self.next_retransmit, self.backoff.as_mut()) else {
            return FlightTimeout::Pending;
        };

        if now < next {
            return FlightTimeout::Pending;
        }

        if !backoff.can_retry() {
            self.next_retransmit = None;
            return FlightTimeout::GiveUp;
        }

        backoff.attempt(rng);
        self.next_retransmit = Some(now + backoff.rto());
        FlightTimeout::Retransmit
    }

    /// Progress was made: the peer answered, so the timer stops. The
    /// datagrams stay around for duplicate-triggered resends.
    pub fn stop_timer(&mut self) {
        self.backoff = None;
        self.next_retransmit = None;
    }
}

impl std::fmt::Debug for Flight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flight")
            .field("datagrams", &self.datagrams.len())
            .field("next_retransmit", &self.next_retransmit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng() -> SeededRng {
        SeededRng::new(Some(11))
    }

    #[test]
    fn retransmits_then_gives_up() {
        let mut rng = rng();
        let now = Instant::now();
        let mut flight = Flight::new(
            vec![vec![1, 2, 3]],
            now,
            Duration::from_secs(1),
            2,
            &mut rng,
        );

        // Not due yet.
        assert_eq!(flight.handle_timeout(now, &mut rng), FlightTimeout::Pending);

        let due = flight.poll_timeout().unwrap();
        assert_eq!(flight.handle_timeout(due, &mut rng), FlightTimeout::Retransmit);
        assert_eq!(flight.datagrams(), &[vec![1, 2, 3]]);

        let due = flight.poll_timeout().unwrap();
        assert_eq!(flight.handle_timeout(due, &mut rng), FlightTimeout::Retransmit);

        let due = flight.poll_timeout().unwrap();
        assert_eq!(flight.handle_timeout(due, &mut rng), FlightTimeout::GiveUp);
        assert!(flight.poll_timeout().is_none());
    }

    #[test]
    fn rto_grows_between_retransmits() {
        let mut rng = rng();
        let now = Instant::now();
        let mut flight =
            Flight::new(vec![vec![0]], now, Duration::from_secs(1), 5, &mut rng);

        let first = flight.poll_timeout().unwrap();
        flight.handle_timeout(first, &mut rng);
        let second = flight.poll_timeout().unwrap();

        // Doubled RTO minus maximum jitter still exceeds the first gap.
        assert!(second - first > first - now);
    }

    #[test]
    fn timerless_flight_never_fires() {
        let mut rng = rng();
        let mut flight = Flight::without_timer(vec![vec![9]]);
        assert!(flight.poll_timeout().is_none());
        assert_eq!(
            flight.handle_timeout(Instant::now() + Duration::from_secs(60), &mut rng),
            FlightTimeout::Pending
        );
        assert_eq!(flight.datagrams(), &[vec![9]]);
    }

    #[test]
    fn stopped_timer_keeps_datagrams() {
        let mut rng = rng();
        let now = Instant::now();
        let mut flight =
            Flight::new(vec![vec![7]], now, Duration::from_secs(1), 3, &mut rng);

        flight.stop_timer();
        assert!(flight.poll_timeout().is_none());
        assert_eq!(flight.datagrams(), &[vec![7]]);
    }
}
