use std::fmt::{Display, Formatter};
use thiserror::Error;

/// A trace error result.
pub type Result<T> = std::result::Result<T, Error>;

/// A trace error.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid config: {0}")]
    BadConfig(String),
    #[error("probe failed to send: {0}")]
    SendFailed(String),
    #[error("tracer error: {0}")]
    Other(String),
}

/// A field of a trace request.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Field {
    Dpid,
    InPort,
    DlSrc,
    DlDst,
    DlVlan,
    DlType,
    DlVlanPcp,
    NwSrc,
    NwDst,
    NwTos,
    NwProto,
    TpSrc,
    TpDst,
    Timeout,
}

impl Field {
    /// The rule reported when a value has the right type but the wrong format.
    const fn format_rule(self) -> &'static str {
        match self {
            Self::Dpid => "allows [a-f], int, and :. Lengths: 1-16 and 23",
            Self::DlSrc | Self::DlDst => "allows char [a-f], int, and :. Lengths: 17",
            Self::NwSrc | Self::NwDst => "is not a proper IPv4",
            _ => "has an invalid format",
        }
    }

    /// The rule reported when a value is out of range.
    const fn range_rule(self) -> &'static str {
        match self {
            Self::InPort => "has to be > 0",
            Self::DlVlan => "has to be between 0 and 4095",
            Self::DlType | Self::NwProto => "has to be [0-65535]",
            Self::DlVlanPcp => "has to be [0-7]",
            Self::NwTos => "has to be between 0 and 7",
            Self::TpSrc | Self::TpDst => "has to be between 0 and 65535",
            Self::Timeout => "has to be a positive number of seconds",
            _ => "is out of range",
        }
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Dpid => "dpid",
            Self::InPort => "in_port",
            Self::DlSrc => "dl_src",
            Self::DlDst => "dl_dst",
            Self::DlVlan => "dl_vlan",
            Self::DlType => "dl_type",
            Self::DlVlanPcp => "dl_vlan_pcp",
            Self::NwSrc => "nw_src",
            Self::NwDst => "nw_dst",
            Self::NwTos => "nw_tos",
            Self::NwProto => "nw_proto",
            Self::TpSrc => "tp_src",
            Self::TpDst => "tp_dst",
            Self::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

/// A trace request which could not be turned into a [`crate::FlowDescriptor`].
///
/// The `Display` text is the message returned to the requester.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum ValidationError {
    #[error("Error: Trace key entry missing")]
    TraceMissing,
    #[error("Error: Trace has to be dict")]
    TraceNotDict,
    #[error("Error: switch key not provided")]
    SwitchMissing,
    #[error("Error: switch has to be dict")]
    SwitchNotDict,
    #[error("Error: {0} has to be dict")]
    SectionNotDict(&'static str),
    #[error("Error: tp not provided")]
    TransportMissing,
    #[error("Error: {0} not provided")]
    Missing(Field),
    #[error("Error: {0} has to be string")]
    NotString(Field),
    #[error("Error: {0} has to be integer")]
    NotInteger(Field),
    #[error("Error: {0} has to be a number")]
    NotNumber(Field),
    #[error("Error: {0} {}", .0.format_rule())]
    BadFormat(Field),
    #[error("Error: {0} {}", .0.range_rule())]
    OutOfRange(Field),
}

/// A trace request which was refused before being queued.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum AdmissionError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("Unknown Switch")]
    UnknownSwitch,
    #[error("Switch not Colored")]
    NotColored,
    #[error("Duplicated Trace Request ignored")]
    Duplicate,
    #[error("Trace manager is stopped")]
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(ValidationError::Missing(Field::Dpid), "Error: dpid not provided")]
    #[test_case(ValidationError::NotString(Field::Dpid), "Error: dpid has to be string")]
    #[test_case(ValidationError::BadFormat(Field::Dpid), "Error: dpid allows [a-f], int, and :. Lengths: 1-16 and 23")]
    #[test_case(ValidationError::OutOfRange(Field::InPort), "Error: in_port has to be > 0")]
    #[test_case(ValidationError::BadFormat(Field::DlSrc), "Error: dl_src allows char [a-f], int, and :. Lengths: 17")]
    #[test_case(ValidationError::OutOfRange(Field::DlVlan), "Error: dl_vlan has to be between 0 and 4095")]
    #[test_case(ValidationError::OutOfRange(Field::DlType), "Error: dl_type has to be [0-65535]")]
    #[test_case(ValidationError::BadFormat(Field::NwDst), "Error: nw_dst is not a proper IPv4")]
    #[test_case(ValidationError::SectionNotDict("eth"), "Error: eth has to be dict")]
    fn test_validation_message(err: ValidationError, expected: &str) {
        assert_eq!(expected, err.to_string());
    }

    #[test_case(Error::BadConfig(String::from("parallel_traces must be positive")), "invalid config: parallel_traces must be positive")]
    #[test_case(Error::SendFailed(String::from("switch gone")), "probe failed to send: switch gone")]
    #[test_case(Error::Other(String::from("spawn")), "tracer error: spawn")]
    fn test_error_message(err: Error, expected: &str) {
        assert_eq!(expected, err.to_string());
    }

    #[test]
    fn test_admission_message() {
        assert_eq!("Unknown Switch", AdmissionError::UnknownSwitch.to_string());
        assert_eq!("Switch not Colored", AdmissionError::NotColored.to_string());
        assert_eq!(
            "Error: Trace key entry missing",
            AdmissionError::from(ValidationError::TraceMissing).to_string()
        );
    }
}
