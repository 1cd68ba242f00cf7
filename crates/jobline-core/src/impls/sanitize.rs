/// File-name safe version of `raw`: runs of anything that is not a letter or
/// digit collapse into a single `-`, with no leading or trailing `-`.
pub fn sanitize(raw: &str) -> String {
    raw.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::mixed_symbols("This*is::/legal.😀,?縦書き 123", "This-is-legal-縦書き-123")]
    #[case::already_clean("uploads", "uploads")]
    #[case::only_symbols("::/..", "")]
    #[case::ulid("01HZX3Y5T9ABCDEFGHJKMNPQRS", "01HZX3Y5T9ABCDEFGHJKMNPQRS")]
    fn sanitizes(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(sanitize(raw), expected);
    }
}
