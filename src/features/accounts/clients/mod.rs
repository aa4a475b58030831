pub mod iabako;

pub use iabako::{DisabledSync, IabakoClient, ProfileSync, SyncError};
