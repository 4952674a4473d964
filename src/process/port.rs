//! OS-level free-port discovery by transient bind-probe.
//!
//! A port is considered available iff an exclusive loopback bind succeeds and
//! is immediately released. Probing is sequential from the start of the range
//! — no randomization — so repeated runs allocate the same port when the
//! environment is unchanged, which keeps logs reproducible.
//!
//! The transient listener is the only side effect; nothing is left bound.

use std::net::{Ipv4Addr, TcpListener};
use std::ops::RangeInclusive;

use crate::error::StartError;

/// Finds the first free TCP port on 127.0.0.1 within `range` (inclusive).
///
/// Fails with [`StartError::NoPortAvailable`] when every port in the range is
/// taken. This is fatal for the calling start attempt; the allocator itself
/// never retries.
pub fn find_available_port(range: RangeInclusive<u16>) -> Result<u16, StartError> {
    for port in range.clone() {
        match TcpListener::bind((Ipv4Addr::LOCALHOST, port)) {
            Ok(listener) => {
                // Bind-then-release: the listener closes here, freeing the
                // port for the child about to be spawned.
                drop(listener);
                return Ok(port);
            }
            Err(_) => continue,
        }
    }
    Err(StartError::NoPortAvailable {
        start: *range.start(),
        end: *range.end(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, TcpListener};

    #[test]
    fn returns_port_inside_range() {
        // Grab an ephemeral port, release it, then ask for exactly it.
        let probe = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let free = probe.local_addr().unwrap().port();
        drop(probe);

        let got = find_available_port(free..=free).unwrap();
        assert_eq!(got, free);
    }

    #[test]
    fn fails_when_single_port_range_is_occupied() {
        let holder = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let taken = holder.local_addr().unwrap().port();

        let err = find_available_port(taken..=taken).unwrap_err();
        match err {
            StartError::NoPortAvailable { start, end } => {
                assert_eq!((start, end), (taken, taken));
            }
            other => panic!("expected NoPortAvailable, got {other:?}"),
        }
    }

    #[test]
    fn skips_occupied_port_and_takes_next() {
        let holder = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let taken = holder.local_addr().unwrap().port();
        // The next port may legitimately be busy too; widen the range a bit.
        if let Some(end) = taken.checked_add(16) {
            let got = find_available_port(taken..=end).unwrap();
            assert_ne!(got, taken);
            assert!((taken..=end).contains(&got));
        }
    }
}
