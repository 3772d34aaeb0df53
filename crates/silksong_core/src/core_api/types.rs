use serde::Serialize;

use crate::codec::Mode;
use crate::fingerprint::Fingerprint;
use crate::projector::FlagValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlagEntry {
    pub name: &'static str,
    pub value: FlagValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub mode: Mode,
    pub fingerprint: Fingerprint,
    pub modified: bool,
    pub document_len: usize,
    /// The working copy does not parse or has no readable flag section, so
    /// the counts below are all zero.
    pub malformed: bool,
    pub flags_true: usize,
    pub flags_false: usize,
    pub flags_absent: usize,
}
