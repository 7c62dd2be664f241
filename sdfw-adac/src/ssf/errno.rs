use std::fmt;

use crate::DecodeError;

/// Status codes reported in element 0 of an SSF response.
///
/// The values follow the errno numbering used by the SDFW services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum SsfError {
    Success = 0,
    Eperm = 1,
    Enoent = 2,
    Eio = 5,
    Enxio = 6,
    E2big = 7,
    Ebadf = 9,
    Eagain = 11,
    Enomem = 12,
    Eacces = 13,
    Efault = 14,
    Ebusy = 16,
    Eexist = 17,
    Enodev = 19,
    Einval = 22,
    Enospc = 28,
    Epipe = 32,
    Eproto = 71,
    Enosys = 88,
    Enobufs = 105,
    Etimedout = 116,
    Ealready = 120,
    Emsgsize = 122,
    Enotsup = 134,
}

impl SsfError {
    /// Every status code, in numeric order.
    pub const ALL: [SsfError; 24] = [
        SsfError::Success,
        SsfError::Eperm,
        SsfError::Enoent,
        SsfError::Eio,
        SsfError::Enxio,
        SsfError::E2big,
        SsfError::Ebadf,
        SsfError::Eagain,
        SsfError::Enomem,
        SsfError::Eacces,
        SsfError::Efault,
        SsfError::Ebusy,
        SsfError::Eexist,
        SsfError::Enodev,
        SsfError::Einval,
        SsfError::Enospc,
        SsfError::Epipe,
        SsfError::Eproto,
        SsfError::Enosys,
        SsfError::Enobufs,
        SsfError::Etimedout,
        SsfError::Ealready,
        SsfError::Emsgsize,
        SsfError::Enotsup,
    ];

    /// The numeric code.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// The symbolic errno name.
    pub fn name(self) -> &'static str {
        match self {
            SsfError::Success => "SUCCESS",
            SsfError::Eperm => "EPERM",
            SsfError::Enoent => "ENOENT",
            SsfError::Eio => "EIO",
            SsfError::Enxio => "ENXIO",
            SsfError::E2big => "E2BIG",
            SsfError::Ebadf => "EBADF",
            SsfError::Eagain => "EAGAIN",
            SsfError::Enomem => "ENOMEM",
            SsfError::Eacces => "EACCES",
            SsfError::Efault => "EFAULT",
            SsfError::Ebusy => "EBUSY",
            SsfError::Eexist => "EEXIST",
            SsfError::Enodev => "ENODEV",
            SsfError::Einval => "EINVAL",
            SsfError::Enospc => "ENOSPC",
            SsfError::Epipe => "EPIPE",
            SsfError::Eproto => "EPROTO",
            SsfError::Enosys => "ENOSYS",
            SsfError::Enobufs => "ENOBUFS",
            SsfError::Etimedout => "ETIMEDOUT",
            SsfError::Ealready => "EALREADY",
            SsfError::Emsgsize => "EMSGSIZE",
            SsfError::Enotsup => "ENOTSUP",
        }
    }

    /// Map a status element as found on the wire.
    ///
    /// Services report failures as negative errno values, so the sign is dropped.
    pub fn from_status(status: i128) -> Result<Self, DecodeError> {
        u64::try_from(status.unsigned_abs())
            .ok()
            .and_then(|code| Self::try_from(code).ok())
            .ok_or(DecodeError::UnknownSsfStatus(status))
    }
}

impl fmt::Display for SsfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u64> for SsfError {
    type Error = DecodeError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        SsfError::ALL
            .into_iter()
            .find(|status| u64::from(status.code()) == value)
            .ok_or(DecodeError::UnknownSsfStatus(i128::from(value)))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;

    #[test_case(0, SsfError::Success)]
    #[test_case(1, SsfError::Eperm)]
    #[test_case(22, SsfError::Einval)]
    #[test_case(105, SsfError::Enobufs)]
    #[test_case(120, SsfError::Ealready)]
    #[test_case(134, SsfError::Enotsup)]
    fn code_mapping(code: u64, status: SsfError) {
        assert_eq!(SsfError::try_from(code).unwrap(), status);
        assert_eq!(u64::from(status.code()), code);
    }

    #[test]
    fn every_code_maps_back_to_itself() {
        for status in SsfError::ALL {
            assert_eq!(
                SsfError::try_from(u64::from(status.code())).unwrap(),
                status
            );
        }
    }

    #[test]
    fn codes_are_unique_and_sorted() {
        let codes: Vec<u16> = SsfError::ALL.iter().map(|s| s.code()).collect();
        let mut sorted = codes.clone();
        sorted.sort_unstable();
        sorted.dedup();

        assert_eq!(codes, sorted);
    }

    #[test_case(3)]
    #[test_case(23)]
    #[test_case(135)]
    #[test_case(u64::MAX)]
    fn unmapped_code_is_a_decode_error(code: u64) {
        assert!(matches!(
            SsfError::try_from(code),
            Err(DecodeError::UnknownSsfStatus(value)) if value == i128::from(code)
        ));
    }

    #[test]
    fn negative_status_is_read_by_magnitude() {
        assert_eq!(SsfError::from_status(-22).unwrap(), SsfError::Einval);
        assert_eq!(SsfError::from_status(0).unwrap(), SsfError::Success);
        assert!(matches!(
            SsfError::from_status(-4),
            Err(DecodeError::UnknownSsfStatus(-4))
        ));
    }

    #[test]
    fn display_uses_errno_name() {
        assert_eq!(SsfError::Etimedout.to_string(), "ETIMEDOUT");
    }
}
