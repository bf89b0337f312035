//! Wire text for every command echo, numeric reply and numeric error the
//! server emits. Each variant formats to the literal RFC 1459 payload; the
//! origin prefix and the CRLF terminator are added by [`IrcReply::prefixed`]
//! (or [`IrcReply::bare`] for the unprefixed PING challenge).

/// Version advertised in the 002 reply and RPL_VERSION.
pub const SERVER_VERSION: &str = "1.0";

/// Crafts a fresh PING challenge argument.
pub fn ping_token() -> String {
    format!("ping_{:x}", rand::random::<u32>())
}

/// Builds the `nick!~user@host` origin of a user. Username and hostname are
/// omitted while still unknown during registration.
pub fn user_prefix(nickname: &str, username: &str, hostname: &str) -> String {
    let mut prefix = nickname.to_string();
    if !username.is_empty() {
        prefix.push('!');
        prefix.push_str(username);
    }
    if !hostname.is_empty() {
        prefix.push('@');
        prefix.push_str(hostname);
    }
    prefix
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum IrcReply<'a> {
    // Command echoes
    Nick { nick: &'a str },
    Join { channel: &'a str, key: &'a str },
    Part { channel: &'a str },
    Kick { channel: &'a str, nick: &'a str, comment: &'a str },
    TopicCmd { channel: &'a str, topic: &'a str },
    Privmsg { target: &'a str, text: &'a str },
    Notice { target: &'a str, text: &'a str },
    Quit { reason: &'a str },
    Invite { nick: &'a str, channel: &'a str },
    Ping { token: &'a str },
    Pong { server: &'a str, token: &'a str },
    Wallops { text: &'a str },

    // Connection registration
    Welcome { nick: &'a str, servername: &'a str, prefix: &'a str },
    YourHost { nick: &'a str, servername: &'a str },
    Created { nick: &'a str, date: &'a str },

    // LUSER block
    LuserClient { users: usize, invisible: usize, servers: usize },
    LuserOp { ops: usize },
    LuserChannels { channels: usize },
    LuserMe { clients: usize, servers: usize },

    // ADMIN block
    AdminMe { servername: &'a str },
    AdminLoc1 { location: &'a str },
    AdminLoc2 { location: &'a str },
    AdminEmail { mail: &'a str },

    // User queries
    Away { nick: &'a str, message: &'a str },
    Userhost { replies: &'a str },
    Ison { nicks: &'a str },
    Unaway,
    NowAway,
    EndOfWho { name: &'a str },
    EndOfWhois { nick: &'a str },
    EndOfWhowas { nick: &'a str },

    // Channel queries
    ListStart,
    List { channel: &'a str, visible: usize, topic: &'a str },
    ListEnd,
    ChannelModeIs { channel: &'a str, mode: &'a str },
    NoTopic { channel: &'a str },
    Topic { channel: &'a str, topic: &'a str },
    Inviting { channel: &'a str, nick: &'a str },
    NamReply { channel: &'a str, is_op: bool, can_speak: bool, prefix: &'a str },
    EndOfNames { channel: &'a str },

    // Server queries
    Version { servername: &'a str, comments: &'a str },
    Info { line: &'a str },
    EndOfInfo,
    MotdStart { servername: &'a str },
    Motd { line: &'a str },
    EndOfMotd,
    YoureOper,
    Rehashing { file: &'a str },
    Time { servername: &'a str, time: &'a str },

    // Errors
    ErrNoSuchNick { nick: &'a str },
    ErrNoSuchServer { server: &'a str },
    ErrNoSuchChannel { channel: &'a str },
    ErrCannotSendToChan { channel: &'a str },
    ErrTooManyChannels { channel: &'a str },
    ErrTooManyTargets { target: &'a str },
    ErrNoOrigin,
    ErrNoRecipient { command: &'a str },
    ErrNoTextToSend,
    ErrUnknownCommand { command: &'a str },
    ErrNoMotd,
    ErrFileError { operation: &'a str, file: &'a str },
    ErrNoNicknameGiven,
    ErrErroneusNickname { nick: &'a str },
    ErrNicknameInUse { nick: &'a str },
    ErrUserNotInChannel { nick: &'a str, channel: &'a str },
    ErrNotOnChannel { channel: &'a str },
    ErrUserOnChannel { nick: &'a str, channel: &'a str },
    ErrSummonDisabled,
    ErrUsersDisabled,
    ErrNotRegistered,
    ErrNeedMoreParams { command: &'a str },
    ErrAlreadyRegistered,
    ErrPasswdMismatch,
    ErrChannelIsFull { channel: &'a str },
    ErrInviteOnlyChan { channel: &'a str },
    ErrBannedFromChan { channel: &'a str },
    ErrBadChannelKey { channel: &'a str },
    ErrNoPrivileges,
    ErrChanOpPrivsNeeded { channel: &'a str },
}

impl IrcReply<'_> {
    /// The payload of the reply, without origin prefix or line terminator.
    pub fn format(&self) -> String {
        use IrcReply::*;
        match self {
            Nick { nick } => format!("NICK {nick}"),
            Join { channel, key } => format!("JOIN {channel} {key}"),
            Part { channel } => format!("PART {channel}"),
            Kick { channel, nick, comment } => {
                if comment.is_empty() {
                    format!("KICK {channel} {nick}")
                } else {
                    format!("KICK {channel} {nick} :{comment}")
                }
            }
            TopicCmd { channel, topic } => format!("TOPIC {channel} :{topic}"),
            Privmsg { target, text } => format!("PRIVMSG {target} :{text}"),
            Notice { target, text } => format!("NOTICE {target} :{text}"),
            Quit { reason } => format!("QUIT :{reason}"),
            Invite { nick, channel } => format!("INVITE {nick} {channel}"),
            Ping { token } => format!("PING :{token}"),
            Pong { server, token } => format!("PONG {server} :{token}"),
            Wallops { text } => format!("WALLOPS :{text}"),

            Welcome { nick, servername, prefix } => {
                format!("001 {nick} :Welcome to the {servername} IRC network {prefix}")
            }
            YourHost { nick, servername } => format!(
                "002 {nick} :Your host is {servername}, running SkyIRC version {SERVER_VERSION}"
            ),
            Created { nick, date } => format!("003 {nick} :This server was created {date}"),

            LuserClient { users, invisible, servers } => format!(
                "251 :There are {users} users and {invisible} invisible on {servers} servers"
            ),
            LuserOp { ops } => format!("252 {ops} :operator(s) online"),
            LuserChannels { channels } => format!("254 {channels} :channels formed"),
            LuserMe { clients, servers } => {
                format!("255 :I have {clients} clients and {servers} servers")
            }

            AdminMe { servername } => format!("256 {servername} :Administrative info"),
            AdminLoc1 { location } => format!("257 :{location}"),
            AdminLoc2 { location } => format!("258 :{location}"),
            AdminEmail { mail } => format!("259 :{mail}"),

            Away { nick, message } => format!("301 {nick} :{message}"),
            Userhost { replies } => format!("302 :{replies}"),
            Ison { nicks } => format!("303 :{nicks}"),
            Unaway => "305 :You are no longer marked as being away".to_string(),
            NowAway => "306 :You have been marked as being away".to_string(),
            EndOfWho { name } => format!("315 {name} :End of /WHO list"),
            EndOfWhois { nick } => format!("318 {nick} :End of /WHOIS list"),
            EndOfWhowas { nick } => format!("369 {nick} :End of WHOWAS"),

            ListStart => "321 Channel :Users  Name".to_string(),
            List { channel, visible, topic } => format!("322 {channel} {visible} :{topic}"),
            ListEnd => "323 :End of /LIST".to_string(),
            ChannelModeIs { channel, mode } => format!("324 {channel} {mode}"),
            NoTopic { channel } => format!("331 {channel} :No topic is set"),
            Topic { channel, topic } => format!("332 {channel} :{topic}"),
            Inviting { channel, nick } => format!("341 {channel} {nick}"),
            NamReply { channel, is_op, can_speak, prefix } => {
                let decoration = if *is_op {
                    "@"
                } else if *can_speak {
                    "+"
                } else {
                    ""
                };
                format!("353 {channel} :{decoration}{prefix}")
            }
            EndOfNames { channel } => format!("366 {channel} :End of /NAMES list"),

            Version { servername, comments } => {
                format!("351 {SERVER_VERSION}. {servername} :{comments}")
            }
            Info { line } => format!("371 : {line}"),
            EndOfInfo => "374 :End of /INFO list".to_string(),
            MotdStart { servername } => format!("375 :- {servername} Message of the day -"),
            Motd { line } => format!("372 :- {line}"),
            EndOfMotd => "376 :End of /MOTD command".to_string(),
            YoureOper => "381 :You are now an IRC operator".to_string(),
            Rehashing { file } => format!("382 {file} :Rehashing"),
            Time { servername, time } => format!("391 {servername} :{time}"),

            ErrNoSuchNick { nick } => format!("401 {nick} :No such nick/channel"),
            ErrNoSuchServer { server } => format!("402 {server} :No such server"),
            ErrNoSuchChannel { channel } => format!("403 {channel} :No such channel"),
            ErrCannotSendToChan { channel } => format!("404 {channel} :Cannot send to channel"),
            ErrTooManyChannels { channel } => {
                format!("405 {channel} :You have joined too many channels")
            }
            ErrTooManyTargets { target } => {
                format!("407 {target} :Duplicate recipients. No message delivered")
            }
            ErrNoOrigin => "409 :No origin specified".to_string(),
            ErrNoRecipient { command } => format!("411 :No recipient given ({command})"),
            ErrNoTextToSend => "412 :No text to send".to_string(),
            ErrUnknownCommand { command } => format!("421 {command} :Unknown command"),
            ErrNoMotd => "422 :MOTD File is missing".to_string(),
            ErrFileError { operation, file } => {
                format!("424 :File error doing {operation} on {file}")
            }
            ErrNoNicknameGiven => "431 :No nickname given".to_string(),
            ErrErroneusNickname { nick } => format!("432 {nick} :Erroneus nickname"),
            ErrNicknameInUse { nick } => format!("433 {nick} :Nickname is already in use"),
            ErrUserNotInChannel { nick, channel } => {
                format!("441 {nick} {channel} :They aren't on that channel")
            }
            ErrNotOnChannel { channel } => format!("442 {channel} :You're not on that channel"),
            ErrUserOnChannel { nick, channel } => {
                format!("443 {nick} {channel} :is already on channel")
            }
            ErrSummonDisabled => "445 :SUMMON has been disabled".to_string(),
            ErrUsersDisabled => "446 :USERS has been disabled".to_string(),
            ErrNotRegistered => "451 :You have not registered".to_string(),
            ErrNeedMoreParams { command } => format!("461 {command} :Not enough parameters"),
            ErrAlreadyRegistered => "462 :You may not reregister".to_string(),
            ErrPasswdMismatch => "464 :Password incorrect".to_string(),
            ErrChannelIsFull { channel } => format!("471 {channel} :Cannot join channel (+l)"),
            ErrInviteOnlyChan { channel } => format!("473 {channel} :Cannot join channel (+i)"),
            ErrBannedFromChan { channel } => format!("474 {channel} :Cannot join channel (+b)"),
            ErrBadChannelKey { channel } => format!("475 {channel} :Cannot join channel (+k)"),
            ErrNoPrivileges => {
                "481 :Permission Denied- You're not an IRC operator".to_string()
            }
            ErrChanOpPrivsNeeded { channel } => {
                format!("482 {channel} :You're not channel operator")
            }
        }
    }

    /// Full wire line with an origin prefix, CRLF terminated.
    pub fn prefixed(&self, origin: &str) -> String {
        format!(":{} {}\r\n", origin, self.format())
    }

    /// Full wire line without an origin prefix, CRLF terminated.
    pub fn bare(&self) -> String {
        format!("{}\r\n", self.format())
    }
}
