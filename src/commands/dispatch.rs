use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};

use crate::error::{CommandError, StoreError};
use crate::fetch::{Fetcher, canonicalize, identifier};
use crate::playback::{Engine, Enqueued, PlayOutcome};
use crate::settings::LiveSettings;
use crate::voice::{TextMessage, User, VoiceClient};

use super::access::{AccessPolicy, Role};
use super::verb::{Verb, parse_command};

const MAX_RANDOM: usize = 10;

/// Routes inbound chat commands to the engine and fetcher.
///
/// Everything but `yt` runs on the caller's thread; fetches go to a short-lived
/// worker so a slow download never holds up other commands.
pub struct Dispatcher {
    client: Arc<dyn VoiceClient>,
    engine: Arc<Engine>,
    fetcher: Arc<Fetcher>,
    live: Arc<LiveSettings>,
    access: Arc<dyn AccessPolicy>,
}

impl Dispatcher {
    pub fn new(
        client: Arc<dyn VoiceClient>,
        engine: Arc<Engine>,
        fetcher: Arc<Fetcher>,
        live: Arc<LiveSettings>,
        access: Arc<dyn AccessPolicy>,
    ) -> Self {
        Self {
            client,
            engine,
            fetcher,
            live,
            access,
        }
    }

    /// Handle one message. Returns the worker handle when a fetch was started.
    pub fn handle(&self, message: &TextMessage) -> Option<JoinHandle<()>> {
        let (word, parameter) = parse_command(&message.message)?;
        if !self.client.is_connected() {
            debug!("dropping !{word}: voice connection is closed");
            return None;
        }
        let Some(sender) = self.client.user(message.actor) else {
            debug!("dropping command from unknown session {}", message.actor);
            return None;
        };

        if self.access.is_ignored(&sender.hash) {
            self.reply(&sender, "You are on my ignore list");
            return None;
        }

        let verb = match word.parse::<Verb>() {
            Ok(verb) => verb,
            Err(e) => {
                self.reply(&sender, &e.to_string());
                return None;
            }
        };

        let role = self.access.role(&sender.hash);
        if role < verb.required_role() {
            info!("{} ({}) denied !{}", sender.name, sender.hash, verb.name());
            self.reply(&sender, &CommandError::PermissionDenied.to_string());
            return None;
        }

        debug!("{} ran !{} {:?}", sender.name, verb.name(), parameter);
        match verb {
            Verb::Yt => return self.yt(sender, parameter),
            Verb::Play => self.play(&sender),
            Verb::Stop => {
                self.engine.stop();
            }
            Verb::Skip => {
                self.engine.skip();
            }
            Verb::Np => self.now_playing(&sender),
            Verb::Queue => self.queue(&sender),
            Verb::Random => self.random(&sender, parameter),
            Verb::Volume => self.volume(&sender, parameter),
            Verb::ToggleRandom => self.toggle_random(&sender),
            Verb::Join => self.client.move_to(sender.channel_id),
            Verb::Delete => self.delete(&sender, parameter),
            Verb::Blacklist => self.blacklist(&sender, parameter),
            Verb::Hash => self.hash(&sender, role, parameter),
            Verb::Ignore => self.ignore(&sender, parameter),
            Verb::Unignore => self.unignore(&sender, parameter),
            Verb::Help => self.help(&sender),
        }
        None
    }

    fn reply(&self, user: &User, message: &str) {
        self.client.send_to_user(user.session, message);
    }

    fn yt(&self, sender: User, parameter: Option<&str>) -> Option<JoinHandle<()>> {
        let Some(reference) = parameter else {
            self.reply(&sender, "No video given");
            return None;
        };
        let reference = reference.to_string();
        let client = self.client.clone();
        let engine = self.engine.clone();
        let fetcher = self.fetcher.clone();

        let spawned = thread::Builder::new()
            .name("fetch".to_string())
            .spawn(move || {
                let reply = match fetcher.resolve(&reference) {
                    Ok(track) => match engine.enqueue_or_play(track.clone()) {
                        Ok(Enqueued::Started) => None,
                        Ok(Enqueued::Queued(n)) => {
                            Some(format!("Queued {} ({n} in queue)", track.title))
                        }
                        Err(e) => {
                            warn!("could not start {}: {e}", track.title);
                            Some("Could not play this video".to_string())
                        }
                    },
                    Err(e) => {
                        info!("fetch of {reference} for {} failed: {e}", sender.name);
                        Some(e.user_message())
                    }
                };
                if let Some(reply) = reply {
                    client.send_to_user(sender.session, &reply);
                }
            });

        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("failed to spawn fetch worker: {e}");
                None
            }
        }
    }

    fn play(&self, sender: &User) {
        match self.engine.play() {
            PlayOutcome::Started(_) => {}
            PlayOutcome::AlreadyPlaying => {
                self.reply(sender, "I am already playing. Maybe use !skip instead?")
            }
            PlayOutcome::NothingToPlay => self.reply(sender, "Nothing to play"),
        }
    }

    fn now_playing(&self, sender: &User) {
        match self.engine.now_playing() {
            Some(track) => self.reply(sender, &format!("np: {}", track.title)),
            None => self.reply(sender, "Stopped"),
        }
    }

    fn queue(&self, sender: &User) {
        match self.engine.queue_len() {
            0 => self.reply(sender, "No tracks in queue"),
            n => self.reply(sender, &format!("{n} tracks in queue")),
        }
    }

    fn random(&self, sender: &User, parameter: Option<&str>) {
        let amount = match parameter.map(str::parse::<usize>) {
            None => 1,
            Some(Ok(n)) if (1..=MAX_RANDOM).contains(&n) => n,
            Some(_) => {
                self.reply(sender, &format!("Pick between 1 and {MAX_RANDOM} tracks"));
                return;
            }
        };
        match self.engine.random(amount) {
            Ok(picks) if picks.is_empty() => self.reply(sender, "No tracks cached yet"),
            Ok(_) => {}
            Err(e) => {
                warn!("random pick failed: {e}");
                self.reply(sender, "Could not pick random tracks");
            }
        }
    }

    fn volume(&self, sender: &User, parameter: Option<&str>) {
        let percent = parameter
            .filter(|p| p.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|p| p.parse::<u8>().ok())
            .filter(|p| *p <= 100);
        match percent {
            Some(p) => {
                self.live.set_volume(f32::from(p) / 100.0);
                self.client
                    .send_to_channel(&format!("Volume: {p}% set by {}", sender.name));
            }
            None => {
                let current = (self.live.volume() * 100.0).round() as u32;
                self.reply(sender, &format!("Volume: {current}%"));
            }
        }
    }

    fn toggle_random(&self, sender: &User) {
        if self.live.toggle_autoplay() {
            self.reply(sender, "Random playback started");
            if !self.engine.is_playing() {
                if let Err(e) = self.engine.random(1) {
                    warn!("random pick failed: {e}");
                }
            }
        } else {
            self.reply(sender, "Random playback stopped");
        }
    }

    /// The id a delete-style command targets: the referenced track, else the
    /// one playing.
    fn target(&self, parameter: Option<&str>) -> Option<String> {
        match parameter {
            Some(reference) => Some(identifier(&canonicalize(reference))),
            None => self.engine.now_playing().map(|t| t.id),
        }
    }

    fn delete(&self, sender: &User, parameter: Option<&str>) {
        let Some(id) = self.target(parameter) else {
            self.reply(sender, "Nothing to delete");
            return;
        };
        match self.engine.remove(&id) {
            Ok(track) => {
                info!("{} deleted {} ({id})", sender.name, track.title);
                self.reply(sender, "Deleted successfully");
            }
            Err(StoreError::NotFound(_)) => self.reply(sender, "Nothing to delete"),
            Err(e) => {
                warn!("delete of {id} failed: {e}");
                self.reply(sender, "Failed to delete");
            }
        }
    }

    fn blacklist(&self, sender: &User, parameter: Option<&str>) {
        let Some(id) = self.target(parameter) else {
            self.reply(sender, "Nothing to delete");
            return;
        };
        self.live.blacklist(&id);
        match self.engine.remove(&id) {
            Ok(track) => {
                info!("{} blacklisted {} ({id})", sender.name, track.title);
                self.reply(sender, "Blacklisted and deleted");
            }
            Err(StoreError::NotFound(_)) => self.reply(sender, "Blacklisted"),
            Err(e) => {
                warn!("delete of blacklisted {id} failed: {e}");
                self.reply(sender, "Blacklisted, but failed to delete");
            }
        }
    }

    fn hash(&self, sender: &User, role: Role, parameter: Option<&str>) {
        match parameter {
            Some(name) if role == Role::Owner => match self.client.find_user(name) {
                Some(user) => self.reply(sender, &user.hash),
                None => self.reply(sender, "No such user"),
            },
            _ => self.reply(sender, &sender.hash),
        }
    }

    fn ignore(&self, sender: &User, parameter: Option<&str>) {
        let Some(target) = self.named_user(sender, parameter) else {
            return;
        };
        if self.access.role(&target.hash) == Role::Owner {
            self.reply(sender, "The owner cannot be ignored");
        } else if self.live.ignore(&target.hash) {
            info!("{} now ignores {} ({})", sender.name, target.name, target.hash);
            self.reply(sender, &format!("Ignoring {}", target.name));
        } else {
            self.reply(sender, &format!("{} is already ignored", target.name));
        }
    }

    fn unignore(&self, sender: &User, parameter: Option<&str>) {
        let Some(target) = self.named_user(sender, parameter) else {
            return;
        };
        if self.live.unignore(&target.hash) {
            info!("{} no longer ignores {}", sender.name, target.name);
            self.reply(sender, &format!("No longer ignoring {}", target.name));
        } else {
            self.reply(sender, &format!("{} is not ignored", target.name));
        }
    }

    fn named_user(&self, sender: &User, parameter: Option<&str>) -> Option<User> {
        let Some(name) = parameter else {
            self.reply(sender, "No user given");
            return None;
        };
        let user = self.client.find_user(name);
        if user.is_none() {
            self.reply(sender, "No such user");
        }
        user
    }

    fn help(&self, sender: &User) {
        let verbs: Vec<String> = Verb::ALL
            .into_iter()
            .map(|v| match v.aliases() {
                [] => format!("!{}", v.name()),
                aliases => format!("!{} (!{})", v.name(), aliases.join(", !")),
            })
            .collect();
        self.reply(sender, &format!("Commands: {}", verbs.join(", ")));
    }
}
