use std::io::{self, Cursor, Write};
use std::sync::{Arc, Mutex};

use super::*;
use crate::config::VoiceSettings;

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn client() -> (ConsoleClient, Captured) {
    let out = Captured::default();
    let client = ConsoleClient::with_output(&VoiceSettings::default(), Box::new(out.clone()));
    (client, out)
}

#[test]
fn listen_delivers_trimmed_lines_from_the_console_user() {
    let (client, _) = client();
    let mut received = Vec::new();

    client
        .listen(Cursor::new("!yt http://a\n\n   \n  !skip  \n"), |m| received.push(m))
        .unwrap();

    let me = client.users().into_iter().find(|u| u.name == "console").unwrap();
    assert_eq!(
        received,
        vec![
            TextMessage {
                actor: me.session,
                message: "!yt http://a".to_string(),
            },
            TextMessage {
                actor: me.session,
                message: "!skip".to_string(),
            },
        ]
    );
    assert!(!client.is_connected());
}

#[test]
fn replies_and_channel_posts_reach_the_console() {
    let (client, out) = client();
    let operator = client.find_user("local-console").unwrap();

    client.send_to_user(operator.session, "Permission denied");
    client.send_to_user(client.myself().session, "not shown");
    client.send_to_channel("Volume set to 40");

    assert_eq!(out.text(), "Permission denied\n[Root] Volume set to 40\n");
}

#[test]
fn move_to_changes_the_bot_channel_only() {
    let (client, _) = client();
    let operator = client.find_user("console").unwrap();

    client.move_to(7);

    assert_eq!(client.myself().channel_id, 7);
    assert_eq!(client.user(operator.session).unwrap().channel_id, 0);
    assert!(client.user(42).is_none());
}
