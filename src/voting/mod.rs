//! The election protocol proper: wire structures, phase state machine,
//! ballot codec, voting methods and the collaborator seams.

pub mod ballot;
pub mod broadcast;
pub mod election;
pub mod eligibility;
pub mod invitation;
pub mod messages;
pub mod methods;
pub mod params;
pub mod secrets;

/// Elections are identified by a 32-byte value chosen by the channel,
/// conventionally a hash of the election parameters.
pub type ElectionId = [u8; 32];
