use crate::models::Namespace;

/// Group an 11-digit serial as `NNN-NNNN-NNNN`
///
/// Serials of any other length are returned verbatim.
pub fn format_serial(serial: u64) -> String {
    let digits = serial.to_string();
    if digits.len() != 11 {
        return digits;
    }
    format!("{}-{}-{}", &digits[..3], &digits[3..7], &digits[7..])
}

/// Serial prefixed with its namespace label, e.g. `매칭 #300-0000-0001`
pub fn format_labeled(namespace: Namespace, serial: u64) -> String {
    format!("{} #{}", namespace.spec().label, format_serial(serial))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eleven_digits_grouped() {
        assert_eq!(format_serial(30_000_000_001), "300-0000-0001");
        assert_eq!(format_serial(10_000_000_123), "100-0000-0123");
    }

    #[test]
    fn test_other_lengths_verbatim() {
        assert_eq!(format_serial(1001), "1001");
        assert_eq!(format_serial(2001), "2001");
        assert_eq!(format_serial(300_000_000_001), "300000000001");
        assert_eq!(format_serial(0), "0");
    }

    #[test]
    fn test_grouping_keeps_every_digit() {
        let grouped = format_serial(12_345_678_901);
        assert_eq!(grouped.replace('-', ""), "12345678901");
    }

    #[test]
    fn test_labels() {
        assert_eq!(format_labeled(Namespace::Match, 30_000_000_001), "매칭 #300-0000-0001");
        assert_eq!(format_labeled(Namespace::Request, 1001), "간병 신청 #1001");
        assert_eq!(format_labeled(Namespace::Provider, 2001), "간병사 #2001");
    }
}
