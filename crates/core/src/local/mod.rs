//! Local persistence used in guest mode

mod expiring;
mod guest_flag;

pub use expiring::{system_clock, Clock, ExpiringStore, FileExpiringStore, MemoryExpiringStore};
pub use guest_flag::{FileGuestFlag, GuestFlag, MemoryGuestFlag};
