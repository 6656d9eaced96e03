pub(crate) mod backup;
mod claims;
mod corrections;
mod entities;
mod goals;
mod kv;
mod observer;
mod primitives;
mod sessions;
mod tasks;
mod units;
