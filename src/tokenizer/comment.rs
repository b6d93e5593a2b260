use nom::{
    bytes::complete::tag, character::complete::not_line_ending, combinator::map,
    error::context, sequence::preceded,
};

use super::token::{ParserResult, Token};

/// `#` to end of line. The content is trimmed and excludes the marker.
#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_comment(input: &str) -> ParserResult<Token> {
    context(
        "line comment",
        map(preceded(tag("#"), not_line_ending), |content: &str| {
            Token::Comment(content.trim().to_string())
        }),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_comment() {
        let (rest, token) = parse_comment("#  route by keyword \nstate a").unwrap();
        assert_eq!(token, Token::Comment("route by keyword".to_string()));
        assert_eq!(rest, "\nstate a");
    }

    #[test]
    fn test_empty_comment() {
        let (rest, token) = parse_comment("#").unwrap();
        assert_eq!(token, Token::Comment(String::new()));
        assert_eq!(rest, "");
    }
}
