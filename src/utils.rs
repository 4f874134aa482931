mod rand_compat;
pub(crate) mod serde;

pub(crate) use rand_compat::RngCompat;
pub(crate) use serde::{deserialize, serialize};
