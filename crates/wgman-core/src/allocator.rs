//! Address allocation
//!
//! The pool is host suffixes 2..=254 of the managed /24; suffix 1 belongs
//! to the gateway. There is no free-list: the used set is rebuilt from the
//! peer table on every call, so a removed peer's address is available to
//! the next scan without bookkeeping.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use wgman_protocol::Subnet;

/// First assignable host suffix
pub const FIRST_HOST: u8 = 2;
/// Last assignable host suffix
pub const LAST_HOST: u8 = 254;

/// Host suffixes that may be handed to clients, ascending
fn candidates(subnet: &Subnet) -> impl Iterator<Item = Ipv4Addr> + '_ {
    (FIRST_HOST..=LAST_HOST)
        .map(move |suffix| subnet.host(suffix))
        .filter(move |addr| *addr != subnet.gateway)
}

/// Number of assignable addresses in the pool
pub fn pool_size(subnet: &Subnet) -> usize {
    candidates(subnet).count()
}

/// Lowest free host address, or `None` when the pool is exhausted.
///
/// Deterministic: the same `used` set always yields the same address.
pub fn next_free_address(subnet: &Subnet, used: &HashSet<Ipv4Addr>) -> Option<Ipv4Addr> {
    candidates(subnet).find(|addr| !used.contains(addr))
}
