//! End-to-end protocol scenarios: a real server on an ephemeral port, real
//! TCP clients speaking RFC 1459 lines.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

use skyirc::config::Config;
use skyirc::server::{Context, Server};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

fn quiet_config() -> Config {
    let mut config = Config::default();
    config.server.send_motd = false;
    config.server.send_stats = false;
    config
}

async fn boot(config: Config) -> (SocketAddr, Context) {
    let server = Server::bind("127.0.0.1", 0, config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let ctx = server.context();
    tokio::spawn(server.run());
    (addr, ctx)
}

struct TestClient {
    lines: Lines<BufReader<ReadHalf<TcpStream>>>,
    writer: WriteHalf<TcpStream>,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, writer) = tokio::io::split(stream);
        TestClient {
            lines: BufReader::new(read_half).lines(),
            writer,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .unwrap();
    }

    /// Next line from the server, terminator stripped.
    async fn recv(&mut self) -> String {
        timeout(RECV_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for a server line")
            .expect("read error")
            .expect("connection closed")
    }

    /// Skips lines until one contains the needle.
    async fn recv_until(&mut self, needle: &str) -> String {
        for _ in 0..50 {
            let line = self.recv().await;
            if line.contains(needle) {
                return line;
            }
        }
        panic!("server never sent a line containing {needle:?}");
    }

    /// NICK + USER and drains the welcome block (it ends with ERR_NOMOTD
    /// under the quiet test configuration).
    async fn register(&mut self, nick: &str) {
        self.send(&format!("NICK {nick}")).await;
        self.send(&format!("USER {nick} 0 * :{nick} tester")).await;
        self.recv_until(" 422 ").await;
    }
}

// S1: unprotected registration emits the AUTH notices and the 001/002/003
// block with the exact scenario wire text.
#[tokio::test]
async fn registration_welcome_sequence() {
    let (addr, _ctx) = boot(quiet_config()).await;
    let mut alice = TestClient::connect(addr).await;

    alice.send("NICK alice").await;
    alice.send("USER alice 0 * :Alice A").await;

    assert_eq!(
        alice.recv().await,
        ":irc.local NOTICE AUTH :*** Looking up your hostname..."
    );
    assert_eq!(alice.recv().await, ":irc.local NOTICE AUTH :** Checking ident...");
    assert_eq!(alice.recv().await, ":irc.local NOTICE AUTH :*** Found your hostname");
    assert_eq!(
        alice.recv().await,
        ":irc.local NOTICE AUTH :*** No ident response; username prefixed with ~"
    );
    assert_eq!(
        alice.recv().await,
        ":irc.local 001 alice :Welcome to the irc.local IRC network alice!~alice@127.0.0.1"
    );
    assert_eq!(
        alice.recv().await,
        ":irc.local 002 alice :Your host is irc.local, running SkyIRC version 1.0"
    );
    let created = alice.recv().await;
    assert!(created.starts_with(":irc.local 003 alice :This server was created "));
}

// S2: join and speak; the speaker gets no echo, the other member does.
#[tokio::test]
async fn join_and_speak() {
    let (addr, _ctx) = boot(quiet_config()).await;
    let mut alice = TestClient::connect(addr).await;
    alice.register("alice").await;

    alice.send("JOIN #room").await;
    assert_eq!(alice.recv().await, ":alice!~alice@127.0.0.1 JOIN #room ");
    assert_eq!(alice.recv().await, ":irc.local 331 #room :No topic is set");
    assert_eq!(
        alice.recv().await,
        ":irc.local 353 #room :@alice!~alice@127.0.0.1"
    );
    assert_eq!(alice.recv().await, ":irc.local 366 #room :End of /NAMES list");

    let mut bob = TestClient::connect(addr).await;
    bob.register("bob").await;
    bob.send("JOIN #room").await;
    bob.recv_until("366").await;

    // alice sees bob arrive
    alice.recv_until("JOIN #room").await;

    bob.send("PRIVMSG #room :hello").await;
    assert_eq!(
        alice.recv().await,
        ":bob!~bob@127.0.0.1 PRIVMSG #room :hello"
    );

    // no echo back to the speaker: the next thing bob hears must not be
    // its own message
    bob.send("TIME").await;
    let line = bob.recv().await;
    assert!(line.contains(" 391 "), "unexpected line: {line}");
}

// S3: a non-op joining a moderated channel cannot speak.
#[tokio::test]
async fn moderated_channel_mutes_guests() {
    let mut config = quiet_config();
    config.channel.is_moderated = true;
    let (addr, _ctx) = boot(config).await;

    let mut alice = TestClient::connect(addr).await;
    alice.register("alice").await;
    alice.send("JOIN #room").await;
    alice.recv_until("366").await;

    let mut bob = TestClient::connect(addr).await;
    bob.register("bob").await;
    bob.send("JOIN #room").await;
    bob.recv_until("366").await;

    bob.send("PRIVMSG #room :let me in").await;
    assert_eq!(
        bob.recv().await,
        ":irc.local 404 #room :Cannot send to channel"
    );

    // the creator holds channel op and speaks through the moderation
    alice.recv_until("JOIN #room").await;
    alice.send("PRIVMSG #room :welcome").await;
    assert_eq!(
        bob.recv().await,
        ":alice!~alice@127.0.0.1 PRIVMSG #room :welcome"
    );
}

// S4: wrong channel key.
#[tokio::test]
async fn join_with_bad_key() {
    let (addr, ctx) = boot(quiet_config()).await;
    let mut alice = TestClient::connect(addr).await;
    alice.register("alice").await;
    alice.send("JOIN #vip").await;
    alice.recv_until("366").await;

    // keys are configuration state, mode mutation is out of scope
    let vip = ctx.channels.lookup("#vip").unwrap();
    vip.update(|data| data.key = "secret".to_string()).await;

    let mut bob = TestClient::connect(addr).await;
    bob.register("bob").await;
    bob.send("JOIN #vip wrong").await;
    assert_eq!(
        bob.recv().await,
        ":irc.local 475 #vip :Cannot join channel (+k)"
    );

    bob.send("JOIN #vip secret").await;
    bob.recv_until("366").await;
}

// S5: a silent peer is pinged, times out, and its co-channel peers see the
// QUIT broadcast. A PONG with the wrong token does not keep it alive.
#[tokio::test]
async fn ping_timeout_broadcasts_quit() {
    let mut config = quiet_config();
    config.connection.ping_refresh_delay = 1;
    config.connection.ping_timeout_delay = 2;
    let (addr, _ctx) = boot(config).await;

    let mut alice = TestClient::connect(addr).await;
    alice.register("alice").await;
    alice.send("JOIN #room").await;
    alice.recv_until("366").await;

    let mut bob = TestClient::connect(addr).await;
    bob.register("bob").await;
    bob.send("JOIN #room").await;
    bob.recv_until("366").await;
    alice.recv_until("JOIN #room").await;

    // bob answers the challenge with a stale token, which must not count
    let challenge = bob.recv_until("PING :ping_").await;
    assert!(challenge.starts_with("PING :ping_"), "got {challenge}");
    bob.send("PONG :ping_stale").await;

    // alice keeps answering properly and waits for bob's QUIT
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        assert!(
            tokio::time::Instant::now() < deadline,
            "bob's QUIT never arrived"
        );
        let line = alice.recv().await;
        if let Some(token) = line.strip_prefix("PING :") {
            alice.send(&format!("PONG :{token}")).await;
        } else if line == ":bob!~bob@127.0.0.1 QUIT :Ping timeout" {
            break;
        }
    }
}

// S6: unknown command.
#[tokio::test]
async fn unknown_command() {
    let (addr, _ctx) = boot(quiet_config()).await;
    let mut alice = TestClient::connect(addr).await;
    alice.register("alice").await;
    alice.send("FOO bar").await;
    assert_eq!(alice.recv().await, ":irc.local 421 FOO :Unknown command");
}

// QUIT cleans both directories and empties out the channel.
#[tokio::test]
async fn quit_cleans_directories() {
    let (addr, ctx) = boot(quiet_config()).await;
    let mut alice = TestClient::connect(addr).await;
    alice.register("alice").await;
    alice.send("JOIN #room").await;
    alice.recv_until("366").await;

    let mut bob = TestClient::connect(addr).await;
    bob.register("bob").await;
    bob.send("JOIN #room").await;
    bob.recv_until("366").await;
    alice.recv_until("JOIN #room").await;

    bob.send("QUIT :gone fishing").await;
    assert_eq!(
        alice.recv().await,
        ":bob!~bob@127.0.0.1 QUIT :gone fishing"
    );

    alice.send("PRIVMSG bob :anyone home?").await;
    assert_eq!(
        alice.recv().await,
        ":irc.local 401 bob :No such nick/channel"
    );

    alice.send("QUIT :me too").await;
    // give the teardown a moment, then the channel must be gone
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(ctx.channels.lookup("#room").is_none());
    assert!(ctx.users.lookup("alice").await.is_none());
}

// Nickname collisions and erroneous nicknames during registration.
#[tokio::test]
async fn nickname_rules() {
    let (addr, _ctx) = boot(quiet_config()).await;
    let mut alice = TestClient::connect(addr).await;
    alice.register("alice").await;

    let mut imposter = TestClient::connect(addr).await;
    imposter.send("NICK alice").await;
    assert_eq!(
        imposter.recv().await,
        ":irc.local 433 alice :Nickname is already in use"
    );
    imposter.send("NICK 9lives").await;
    assert_eq!(
        imposter.recv().await,
        ":irc.local 432 9lives :Erroneus nickname"
    );
}

// PASS gate: wrong password replies 464 and leaves the gate closed; NICK
// attempts behind the gate get the same answer; the right password opens it.
#[tokio::test]
async fn password_protected_registration() {
    let mut config = quiet_config();
    config.server.is_password_protected = true;
    config.server.server_password.insert("sekret".to_string());
    let (addr, _ctx) = boot(config).await;

    let mut alice = TestClient::connect(addr).await;
    alice.send("PASS wrong").await;
    assert_eq!(alice.recv().await, ":irc.local 464 :Password incorrect");
    alice.send("NICK alice").await;
    assert_eq!(alice.recv().await, ":irc.local 464 :Password incorrect");

    alice.send("PASS sekret").await;
    alice.register("alice").await;
}

// TOPIC read/set with the ops-only gate.
#[tokio::test]
async fn topic_set_requires_op() {
    let (addr, _ctx) = boot(quiet_config()).await;
    let mut alice = TestClient::connect(addr).await;
    alice.register("alice").await;
    alice.send("JOIN #room").await;
    alice.recv_until("366").await;

    let mut bob = TestClient::connect(addr).await;
    bob.register("bob").await;
    bob.send("JOIN #room").await;
    bob.recv_until("366").await;
    alice.recv_until("JOIN #room").await;

    // +t is the configured default, bob is not an op
    bob.send("TOPIC #room :bob was here").await;
    assert_eq!(
        bob.recv().await,
        ":irc.local 482 #room :You're not channel operator"
    );

    alice.send("TOPIC #room :welcome all").await;
    assert_eq!(
        bob.recv().await,
        ":alice!~alice@127.0.0.1 TOPIC #room :welcome all"
    );

    bob.send("TOPIC #room").await;
    assert_eq!(bob.recv().await, ":irc.local 332 #room :welcome all");
}

// KICK broadcast reaches the kicked user before the removal.
#[tokio::test]
async fn kick_reaches_the_kicked() {
    let (addr, ctx) = boot(quiet_config()).await;
    let mut alice = TestClient::connect(addr).await;
    alice.register("alice").await;
    alice.send("JOIN #room").await;
    alice.recv_until("366").await;

    let mut bob = TestClient::connect(addr).await;
    bob.register("bob").await;
    bob.send("JOIN #room").await;
    bob.recv_until("366").await;
    alice.recv_until("JOIN #room").await;

    alice.send("KICK #room bob :enough").await;
    assert_eq!(
        bob.recv().await,
        ":alice!~alice@127.0.0.1 KICK #room bob :enough"
    );

    tokio::time::sleep(Duration::from_millis(200)).await;
    let room = ctx.channels.lookup("#room").unwrap();
    assert_eq!(room.member_count().await, 1);
}

// Away users answer PRIVMSG with their away message.
#[tokio::test]
async fn away_back_reply() {
    let (addr, _ctx) = boot(quiet_config()).await;
    let mut alice = TestClient::connect(addr).await;
    alice.register("alice").await;
    let mut bob = TestClient::connect(addr).await;
    bob.register("bob").await;

    bob.send("AWAY :gone for lunch").await;
    assert_eq!(
        bob.recv().await,
        ":irc.local 306 :You have been marked as being away"
    );

    alice.send("PRIVMSG bob :ping").await;
    assert_eq!(alice.recv().await, ":irc.local 301 bob :gone for lunch");

    bob.send("AWAY").await;
    assert_eq!(
        bob.recv().await,
        ":irc.local 305 :You are no longer marked as being away"
    );
}

// OPER, WALLOPS and KILL: the op privilege chain.
#[tokio::test]
async fn oper_wallops_and_kill() {
    let (addr, _ctx) = boot(quiet_config()).await;
    let mut alice = TestClient::connect(addr).await;
    alice.register("alice").await;
    alice.send("JOIN #room").await;
    alice.recv_until("366").await;

    let mut bob = TestClient::connect(addr).await;
    bob.register("bob").await;
    bob.send("JOIN #room").await;
    bob.recv_until("366").await;
    alice.recv_until("JOIN #room").await;

    bob.send("WALLOPS :not allowed").await;
    assert_eq!(
        bob.recv().await,
        ":irc.local 481 :Permission Denied- You're not an IRC operator"
    );

    alice.send("OPER root toor").await;
    assert_eq!(
        alice.recv().await,
        ":irc.local 381 :You are now an IRC operator"
    );

    // ops receiving wallops hear themselves too
    alice.send("WALLOPS :maintenance soon").await;
    assert_eq!(
        alice.recv().await,
        ":alice!~alice@127.0.0.1 WALLOPS :maintenance soon"
    );

    // the QUIT broadcast reaches the co-channel peer before the op notice
    alice.send("KILL bob :flooding").await;
    assert_eq!(alice.recv().await, ":bob!~bob@127.0.0.1 QUIT :flooding");
    assert_eq!(
        alice.recv().await,
        ":irc.local NOTICE alice :User connection killed !"
    );
}

// LIST visibility: secret channels disappear, private ones show a stub.
#[tokio::test]
async fn list_honors_visibility() {
    let (addr, ctx) = boot(quiet_config()).await;
    let mut alice = TestClient::connect(addr).await;
    alice.register("alice").await;
    alice.send("JOIN #open,#hidden,#club").await;
    alice.recv_until("366").await;
    alice.recv_until("366").await;
    alice.recv_until("366").await;

    ctx.channels
        .lookup("#hidden")
        .unwrap()
        .update(|data| data.secret = true)
        .await;
    ctx.channels
        .lookup("#club")
        .unwrap()
        .update(|data| data.private = true)
        .await;

    let mut bob = TestClient::connect(addr).await;
    bob.register("bob").await;
    bob.send("LIST").await;

    let mut lines = Vec::new();
    loop {
        let line = bob.recv().await;
        let done = line.contains(" 323 ");
        lines.push(line);
        if done {
            break;
        }
    }
    let listing = lines.join("\n");
    assert!(listing.contains("322 #open 1 :"));
    assert!(listing.contains("322 #club 0 :Prv"));
    assert!(!listing.contains("#hidden"));
}
