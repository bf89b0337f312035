use nom::{
    IResult, Parser,
    bytes::complete::take_while,
    character::complete::{char, satisfy},
    combinator::{recognize, verify},
    multi::separated_list1,
    sequence::pair,
};

//   nickname   =  ( letter / special ) *( letter / digit / special / "-" )
//   special    =  "[", "]", "\", "`", "_", "^", "{", "|", "}"
//   channel    =  ( "#" / "&" ) chanstring
//   chanstring =  any octet except NUL, BELL, CR, LF, " " and ","
//   hostname   =  shortname *( "." shortname )
//   shortname  =  ( letter / digit ) *( letter / digit / "-" ) ( letter / digit )

const NICKNAME_MAX: usize = 16;
const CHANNEL_NAME_MAX: usize = 201;

fn is_nickname_first_char(c: char) -> bool {
    c.is_ascii_alphabetic() || "_-[]\\^{}|`".contains(c)
}

fn is_nickname_tail_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "_-[]\\^{}|`".contains(c)
}

fn nickname_parser(input: &str) -> IResult<&str, &str> {
    verify(
        recognize(pair(
            satisfy(is_nickname_first_char),
            take_while(is_nickname_tail_char),
        )),
        |s: &str| s.len() <= NICKNAME_MAX,
    )
    .parse(input)
}

/// 1 to 16 chars, first one a letter or special, digits allowed afterwards.
pub fn is_valid_nickname(input: &str) -> bool {
    matches!(nickname_parser(input), Ok(("", _)))
}

fn is_channel_char(c: char) -> bool {
    !matches!(c, '\0' | '\u{0007}' | '\r' | '\n' | ' ' | ',')
}

fn channel_parser(input: &str) -> IResult<&str, &str> {
    verify(
        recognize(pair(
            satisfy(|c| c == '#' || c == '&'),
            verify(take_while(is_channel_char), |s: &str| !s.is_empty()),
        )),
        |s: &str| s.len() <= CHANNEL_NAME_MAX,
    )
    .parse(input)
}

/// `#` or `&` followed by 1 to 200 chars without space, comma or BEL.
pub fn is_valid_channel_name(input: &str) -> bool {
    matches!(channel_parser(input), Ok(("", _)))
}

fn shortname_parser(input: &str) -> IResult<&str, &str> {
    verify(
        recognize(pair(
            satisfy(|c: char| c.is_ascii_alphanumeric()),
            take_while(|c: char| c.is_ascii_alphanumeric() || c == '-'),
        )),
        // a label may not end with '-'
        |s: &str| !s.ends_with('-'),
    )
    .parse(input)
}

fn hostname_parser(input: &str) -> IResult<&str, &str> {
    recognize(separated_list1(char('.'), shortname_parser)).parse(input)
}

/// Dot separated alphanumeric labels, inner dashes allowed.
pub fn is_valid_hostname(input: &str) -> bool {
    matches!(hostname_parser(input), Ok(("", _)))
}

/// Glob match of a ban mask against a user prefix. `*` spans any run of
/// characters, `?` exactly one. Matching is case sensitive, like the
/// directories.
pub fn mask_matches(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let mut p = 0;
    let mut t = 0;
    let mut star_p = None;
    let mut star_t = 0;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            // remember the star so a later mismatch can backtrack to it
            star_p = Some(p);
            star_t = t;
            p += 1;
        } else if let Some(sp) = star_p {
            p = sp + 1;
            star_t += 1;
            t = star_t;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}
