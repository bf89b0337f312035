use nom::{
    IResult, Parser,
    bytes::complete::take_while1,
    character::complete::char,
    sequence::preceded,
};

use crate::errors::MessageError;

// 2.3.1 Message format in Augmented BNF
//
//     message    =  [ ":" prefix SPACE ] command [ params ] crlf
//     prefix     =  servername / ( nickname [ [ "!" user ] "@" host ] )
//     command    =  1*letter / 3digit
//     params     =  *14( SPACE middle ) [ SPACE ":" trailing ]
//
//     middle     =  nospcrlfcl *( ":" / nospcrlfcl )
//     trailing   =  *( ":" / " " / nospcrlfcl )
//
//     SPACE      =  %x20        ; space character
//     crlf       =  %x0D %x0A   ; "carriage return" "linefeed"

/// Hard RFC limit on a full protocol line, CRLF included. Oversized lines
/// are dropped by the reader before they reach the parser.
pub const MAX_LINE_LENGTH: usize = 512;

/// PRIVMSG and NOTICE accept at most this many comma separated targets.
pub const MAX_MSG_TARGETS: usize = 5;

/// One framed client request: optional prefix, uppercased command, raw
/// argument list. The trailing parameter keeps its embedded spaces.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub prefix: Option<String>,
    pub command: String,
    pub args: Vec<String>,
}

fn prefix_parser(input: &str) -> IResult<&str, &str> {
    preceded(char(':'), take_while1(|c: char| c != ' ')).parse(input)
}

fn token_parser(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c != ' ').parse(input)
}

impl Message {
    /// Frames one request line. The line terminator may already be stripped
    /// by the reader; any remaining CR/LF tail is ignored. Blank lines and
    /// lines without a command are rejected.
    pub fn parse(line: &str) -> Result<Message, MessageError> {
        let mut rest = line.trim_end_matches(['\r', '\n']);
        if rest.trim().is_empty() {
            return Err(MessageError::EmptyLine);
        }

        let mut prefix = None;
        if let Ok((after, parsed)) = prefix_parser(rest) {
            prefix = Some(parsed.to_string());
            rest = after;
        }

        rest = rest.trim_start_matches(' ');
        let (mut rest, command) = match token_parser(rest) {
            Ok(parsed) => parsed,
            Err(_) => return Err(MessageError::MissingCommand),
        };

        let mut args = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                // trailing parameter swallows the rest of the line, spaces included
                args.push(trailing.to_string());
                break;
            }
            match token_parser(rest) {
                Ok((after, arg)) => {
                    args.push(arg.to_string());
                    rest = after;
                }
                Err(_) => break,
            }
        }

        Ok(Message {
            prefix,
            command: command.to_uppercase(),
            args,
        })
    }
}

/// Expands a `a,b,c` argument into its individual targets, used by
/// JOIN / PART / NAMES / LIST / PRIVMSG / NOTICE.
pub fn split_targets(arg: &str) -> Vec<String> {
    arg.split(',')
        .filter(|target| !target.is_empty())
        .map(str::to_string)
        .collect()
}
