use time::{format_description::well_known::Rfc3339, OffsetDateTime};

pub(crate) fn now_rfc3339() -> String {
    format_rfc3339(OffsetDateTime::now_utc())
}

pub(crate) fn format_rfc3339(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn format_rfc3339_outputs_utc_z() {
        let value = datetime!(2025-01-02 10:20:30 UTC);
        assert_eq!(format_rfc3339(value), "2025-01-02T10:20:30Z");
    }

    #[test]
    fn now_rfc3339_is_utc() {
        let rendered = now_rfc3339();
        assert!(rendered.ends_with('Z'), "expected UTC timestamp, got {rendered}");
        assert!(rendered.contains('T'));
    }
}
