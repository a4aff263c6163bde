use derive_more::{Add, AddAssign};
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// `RequestId` newtype.
///
/// Identifies one trace request for the lifetime of a [`crate::Manager`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

/// `Step` newtype.
///
/// The hop counter of a single trace, incremented once per probe.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Add, AddAssign, Serialize,
)]
#[serde(transparent)]
pub struct Step(pub u64);

/// OpenFlow port number newtype.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct PortNo(pub u64);

/// Datapath identifier newtype.
///
/// Held exactly as supplied, i.e. `1`, `0000000000000001` or `00:00:00:00:00:00:00:01`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Dpid(pub String);

impl Dpid {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Dpid {
    fn from(dpid: &str) -> Self {
        Self(dpid.to_string())
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for Step {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for PortNo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for Dpid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
