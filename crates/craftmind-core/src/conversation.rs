//! Conversation engine.
//!
//! Reactive path: prefixed chat messages become deterministic command
//! replies (`help`, `ping`), fixed answers, or generation prompts composed
//! from action memory, per-player context and the query itself. Proactive
//! path: a periodic tick emits an unprompted remark after enough silence,
//! gated on somebody being around to read it.
//!
//! The reactive path never errors outward: generation failures collapse
//! into a fixed apologetic fallback string.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use craftmind_traits::{GameSession, RecipeLookup, TextGenerator};

use crate::memory::{SharedActionMemory, SharedPlayerMemory};

/// Reply used whenever the generation collaborator fails.
pub const FALLBACK_REPLY: &str = "I'm having a bit of trouble thinking right now. Ask me later!";

/// Phrases that mark a query as a recipe question. Matched as lowercase
/// prefixes, longest first so "what is the recipe for" wins over "recipe
/// for".
const RECIPE_TRIGGERS: [&str; 5] = [
    "what is the recipe for",
    "how do i make",
    "how to make",
    "recipe for",
    "craft",
];

/// If `query` is a recipe question, return the item name it asks about,
/// original casing preserved.
pub fn extract_recipe_query(query: &str) -> Option<String> {
    for trigger in RECIPE_TRIGGERS {
        if let Some(rest) = strip_prefix_ignore_case(query, trigger) {
            let item = rest.trim();
            if item.is_empty() {
                return None;
            }
            return Some(item.to_string());
        }
    }
    None
}

/// Case-insensitive prefix strip that never splits the original string
/// mid-character. Lowercasing can change byte length (U+212A lowercases to
/// an ASCII `k`), so prefixes are matched char by char and the remainder
/// is taken from the untouched original.
fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let mut rest = text;
    for expected in prefix.chars() {
        let mut chars = rest.chars();
        let actual = chars.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
        rest = chars.as_str();
    }
    Some(rest)
}

/// Timing knobs for the proactive path.
#[derive(Debug, Clone)]
pub struct ProactiveConfig {
    pub check_interval: Duration,
    /// Silence required before speaking when other players are present.
    pub with_players: Duration,
    /// Silence required when alone.
    pub alone: Duration,
}

pub struct ConversationEngine {
    generator: Option<Arc<dyn TextGenerator>>,
    recipes: Arc<dyn RecipeLookup>,
    actions: SharedActionMemory,
    players: SharedPlayerMemory,
    prefix: String,
    bot_name: String,
    system_prompt: String,
}

impl ConversationEngine {
    pub fn new(
        generator: Option<Arc<dyn TextGenerator>>,
        recipes: Arc<dyn RecipeLookup>,
        actions: SharedActionMemory,
        players: SharedPlayerMemory,
        prefix: impl Into<String>,
        bot_name: impl Into<String>,
    ) -> Self {
        let bot_name = bot_name.into();
        Self {
            generator,
            recipes,
            actions,
            players,
            prefix: prefix.into(),
            system_prompt: build_system_prompt(&bot_name),
            bot_name,
        }
    }

    /// Whether the generation collaborator is configured.
    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    /// Handle one inbound chat message. `None` means the message was not
    /// addressed to the bot; `Some` is always a sendable reply.
    pub async fn handle_chat(
        &self,
        username: &str,
        message: &str,
        latency_ms: Option<u64>,
    ) -> Option<String> {
        let query = strip_prefix_ignore_case(message, &self.prefix)?.trim();

        let command = query
            .split_whitespace()
            .next()
            .map(|token| token.to_lowercase());
        match command.as_deref() {
            None | Some("help") => Some(self.help_text(username)),
            Some("ping") => {
                let latency = latency_ms
                    .map(|ms| format!("{ms}ms"))
                    .unwrap_or_else(|| "unknown".to_string());
                Some(format!("Pong, {username}! My ping is currently {latency}."))
            }
            Some(_) => Some(self.free_form(username, query).await),
        }
    }

    fn help_text(&self, username: &str) -> String {
        format!(
            "Hi {username}! I'm {bot}. Chat with me by starting your message with \"{prefix}\". \
             For example: \"{prefix} how are you?\" or ask me about recipes!",
            bot = self.bot_name,
            prefix = self.prefix,
        )
    }

    async fn free_form(&self, username: &str, query: &str) -> String {
        let Some(generator) = self.generator.clone() else {
            return self.offline_reply(username, query);
        };

        self.players.lock().record_message(username, query);
        let actions_summary = self.actions.lock().summary();
        let player_ctx = self.players.lock().context(username);

        if let Some(item) = extract_recipe_query(query) {
            let recipe_info = self.recipes.lookup(&item);
            debug!(item, "answering recipe question");
            let prompt = build_recipe_prompt(
                &self.bot_name,
                username,
                &item,
                &recipe_info,
                actions_summary.as_deref(),
                player_ctx.as_deref(),
            );
            return self.generate_or_fallback(&generator, &prompt).await;
        }

        match query.to_lowercase().as_str() {
            "how are you" => {
                return match actions_summary {
                    Some(summary) => format!(
                        "I'm doing great, {username}! Exploring the world as always. \
                         I've just been {summary}."
                    ),
                    None => format!("I'm doing great, {username}! Exploring the world as always."),
                };
            }
            "what are you" => {
                return format!(
                    "I'm {}, {username}, an AI here to chat and explore with you!",
                    self.bot_name
                );
            }
            _ => {}
        }

        let prompt = build_reply_prompt(
            &self.bot_name,
            username,
            query,
            actions_summary.as_deref(),
            player_ctx.as_deref(),
        );
        self.generate_or_fallback(&generator, &prompt).await
    }

    fn offline_reply(&self, username: &str, query: &str) -> String {
        if query.to_lowercase() == "how are you" {
            format!("I'm doing well, {username}! Just a bit limited without my AI brain connected.")
        } else {
            format!(
                "I'm here, {username}, but my AI features are offline. \
                 You can still ask me for 'help' or 'ping'."
            )
        }
    }

    async fn generate_or_fallback(&self, generator: &Arc<dyn TextGenerator>, prompt: &str) -> String {
        match generator.generate(prompt, &self.system_prompt).await {
            Ok(text) => text.trim().to_string(),
            Err(err) => {
                warn!("text generation failed, using fallback: {err}");
                FALLBACK_REPLY.to_string()
            }
        }
    }

    /// Build and generate one unprompted remark. `None` when generation is
    /// unavailable or fails (proactive failures are dropped, not spoken).
    pub async fn proactive_remark(&self, present: &[String]) -> Option<String> {
        let generator = self.generator.as_ref()?;
        let actions_summary = self.actions.lock().summary();
        let nearby = present.first().and_then(|name| {
            self.players
                .lock()
                .context(name)
                .map(|ctx| (name.clone(), ctx))
        });
        let prompt = build_remark_prompt(
            &self.bot_name,
            actions_summary.as_deref(),
            nearby.as_ref().map(|(name, ctx)| (name.as_str(), ctx.as_str())),
        );
        match generator.generate(&prompt, &self.system_prompt).await {
            Ok(text) => Some(text.trim().to_string()),
            Err(err) => {
                warn!("proactive generation failed, skipping remark: {err}");
                None
            }
        }
    }
}

/// Run the proactive tick until cancelled.
///
/// When nobody else is present the silence clock resets without sending,
/// so a returning player is not greeted with a backlog the moment they
/// join. Documented policy choice; see DESIGN.md.
pub fn spawn_proactive(
    engine: Arc<ConversationEngine>,
    session: Arc<dyn GameSession>,
    config: ProactiveConfig,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_sent = Instant::now();
        let mut ticker = tokio::time::interval(config.check_interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let present = session.players_present();
                    let threshold = if present.is_empty() {
                        config.alone
                    } else {
                        config.with_players
                    };
                    if last_sent.elapsed() < threshold {
                        continue;
                    }
                    if present.is_empty() {
                        last_sent = Instant::now();
                        continue;
                    }
                    if let Some(remark) = engine.proactive_remark(&present).await {
                        info!(remark, "sending proactive remark");
                        if let Err(err) = session.chat(&remark).await {
                            warn!("failed to send proactive remark: {err}");
                        }
                    }
                    last_sent = Instant::now();
                }
            }
        }
    })
}

fn build_system_prompt(bot_name: &str) -> String {
    format!(
        "You are {bot_name}, a friendly and curious AI assistant controlling a bot inside a \
         multiplayer block-building world. You enjoy chatting with players and sometimes make \
         witty or playful comments about your surroundings or your own actions. If given \
         context about your recent actions or a player's previous messages, make your reply a \
         natural follow-up. Vary your phrasing and avoid fixating on one topic. Keep replies \
         concise (1-2 sentences), suitable for in-game chat, and never use markdown formatting."
    )
}

fn build_reply_prompt(
    bot_name: &str,
    username: &str,
    query: &str,
    actions_summary: Option<&str>,
    player_ctx: Option<&str>,
) -> String {
    match (actions_summary, player_ctx) {
        (actions, Some(ctx)) => format!(
            "As {bot_name}, an AI in the game: I've recently been {activity}. {ctx}. Now, \
             {username} said to me: \"{query}\". Respond naturally, keeping our past \
             interaction in mind, and concisely to {username}.",
            activity = actions.unwrap_or("around"),
        ),
        (Some(summary), None) => format!(
            "As {bot_name}, an AI in the game: I've recently been {summary}. Now, a player \
             named {username} said to me: \"{query}\". Respond naturally and concisely to \
             {username}."
        ),
        (None, None) => format!(
            "As {bot_name}, an AI in the game: A player named {username} said to you: \
             \"{query}\". Respond naturally and concisely."
        ),
    }
}

fn build_recipe_prompt(
    bot_name: &str,
    username: &str,
    item: &str,
    recipe_info: &str,
    actions_summary: Option<&str>,
    player_ctx: Option<&str>,
) -> String {
    let mut prompt = format!(
        "As {bot_name}, an AI in the game: Player {username} asked about a recipe for {item}. \
         I found this information: \"{recipe_info}\". Please convey this to {username} in a \
         helpful and friendly way."
    );
    if let Some(summary) = actions_summary {
        prompt.push_str(&format!(" For context, my recent actions were: {summary}."));
    }
    if let Some(ctx) = player_ctx {
        prompt.push_str(&format!(" Our recent conversation: {ctx}."));
    }
    prompt.push_str(" Keep your response concise and suitable for chat.");
    prompt
}

fn build_remark_prompt(
    bot_name: &str,
    actions_summary: Option<&str>,
    nearby: Option<(&str, &str)>,
) -> String {
    let nearby_context = nearby
        .map(|(name, ctx)| format!(" Player {name} is nearby, and {ctx}."))
        .unwrap_or_default();
    match actions_summary {
        Some(summary) => format!(
            "As {bot_name}, an AI in the game, considering I've recently been \
             {summary},{nearby_context} share a brief, random observation or thought. This \
             could be a reflection on those activities, something I notice around me, or a \
             general musing. Aim for variety. Keep it short and natural for chat."
        ),
        None => format!(
            "As {bot_name}, an AI in the game,{nearby_context} share a brief, random \
             observation or thought about the world around you or a general musing. Aim for \
             variety. Keep it short and natural for chat."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ActionMemory, PlayerMemory};
    use async_trait::async_trait;
    use craftmind_ai::MockGenerator;
    use craftmind_traits::{MovementDirection, Position, SessionError};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FlatRecipes;

    impl RecipeLookup for FlatRecipes {
        fn lookup(&self, item_name: &str) -> String {
            format!("To make {item_name}, you need: 4 planks.")
        }
    }

    struct Harness {
        engine: ConversationEngine,
        generator: Arc<MockGenerator>,
        players: SharedPlayerMemory,
        actions: SharedActionMemory,
    }

    fn harness(with_generator: bool) -> Harness {
        let generator = Arc::new(MockGenerator::new());
        let actions: SharedActionMemory = Arc::new(Mutex::new(ActionMemory::default()));
        let players: SharedPlayerMemory = Arc::new(Mutex::new(PlayerMemory::default()));
        let engine = ConversationEngine::new(
            with_generator.then(|| generator.clone() as Arc<dyn TextGenerator>),
            Arc::new(FlatRecipes),
            actions.clone(),
            players.clone(),
            "!",
            "Suva",
        );
        Harness {
            engine,
            generator,
            players,
            actions,
        }
    }

    #[tokio::test]
    async fn unprefixed_messages_are_ignored() {
        let h = harness(true);
        assert!(h.engine.handle_chat("alice", "hello there", None).await.is_none());
        assert_eq!(h.generator.calls(), 0);
    }

    #[tokio::test]
    async fn help_and_ping_never_reach_the_generator() {
        let h = harness(true);

        let help = h.engine.handle_chat("alice", "!HELP", Some(12)).await.unwrap();
        assert!(help.contains("alice"));
        assert!(help.contains('!'));

        let pong = h.engine.handle_chat("alice", "! Ping", Some(42)).await.unwrap();
        assert_eq!(pong, "Pong, alice! My ping is currently 42ms.");

        let pong = h.engine.handle_chat("alice", "!ping", None).await.unwrap();
        assert_eq!(pong, "Pong, alice! My ping is currently unknown.");

        assert_eq!(h.generator.calls(), 0);
    }

    #[tokio::test]
    async fn bare_prefix_answers_with_help() {
        let h = harness(true);
        let reply = h.engine.handle_chat("alice", "!", None).await.unwrap();
        assert!(reply.contains("Hi alice"));
        assert_eq!(h.generator.calls(), 0);
    }

    #[tokio::test]
    async fn free_form_query_goes_through_the_generator() {
        let h = harness(true);
        h.generator.push_text("The sunset here is lovely.");

        let reply = h
            .engine
            .handle_chat("alice", "!what do you see", None)
            .await
            .unwrap();
        assert_eq!(reply, "The sunset here is lovely.");
        assert_eq!(h.generator.calls(), 1);
        // The query was recorded as conversational context.
        assert_eq!(h.players.lock().player_count(), 1);
    }

    #[tokio::test]
    async fn generator_failure_returns_the_fixed_fallback() {
        let h = harness(true);
        h.generator.push_error("upstream exploded");

        let reply = h
            .engine
            .handle_chat("alice", "!tell me a story", None)
            .await
            .unwrap();
        assert_eq!(reply, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn fixed_answers_bypass_the_generator() {
        let h = harness(true);
        h.actions.lock().record("jumping");

        let reply = h
            .engine
            .handle_chat("alice", "!How are you", None)
            .await
            .unwrap();
        assert!(reply.contains("I'm doing great, alice!"));
        assert!(reply.contains("jumping"));

        let reply = h
            .engine
            .handle_chat("alice", "!what are you", None)
            .await
            .unwrap();
        assert!(reply.contains("I'm Suva"));

        assert_eq!(h.generator.calls(), 0);
    }

    #[tokio::test]
    async fn recipe_questions_fold_lookup_results_into_the_prompt() {
        let h = harness(true);
        h.generator.push_text("You'll need four planks!");

        let reply = h
            .engine
            .handle_chat("alice", "!how do i make a crafting table", None)
            .await
            .unwrap();
        assert_eq!(reply, "You'll need four planks!");

        let prompts = h.generator.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("a crafting table"));
        assert!(prompts[0].contains("To make a crafting table, you need: 4 planks."));
    }

    #[tokio::test]
    async fn context_is_folded_into_later_prompts() {
        let h = harness(true);
        h.generator.push_text("first");
        h.generator.push_text("second");
        h.actions.lock().record("strafing left");

        let _ = h.engine.handle_chat("alice", "!i found a cave", None).await;
        let _ = h.engine.handle_chat("alice", "!should i go in", None).await;

        let prompts = h.generator.prompts();
        assert!(prompts[1].contains("strafing left"));
        assert!(prompts[1].contains("i found a cave"));
        assert!(prompts[1].contains("should i go in"));
    }

    #[tokio::test]
    async fn offline_mode_keeps_deterministic_replies() {
        let h = harness(false);

        let reply = h
            .engine
            .handle_chat("alice", "!how are you", None)
            .await
            .unwrap();
        assert!(reply.contains("limited without my AI brain"));

        let reply = h
            .engine
            .handle_chat("alice", "!what is going on", None)
            .await
            .unwrap();
        assert!(reply.contains("offline"));

        let pong = h.engine.handle_chat("alice", "!ping", Some(5)).await.unwrap();
        assert_eq!(pong, "Pong, alice! My ping is currently 5ms.");
    }

    #[test]
    fn recipe_trigger_extraction() {
        assert_eq!(
            extract_recipe_query("recipe for torch"),
            Some("torch".to_string())
        );
        assert_eq!(
            extract_recipe_query("What is the recipe for Bread"),
            Some("Bread".to_string())
        );
        assert_eq!(
            extract_recipe_query("how do i make a chest"),
            Some("a chest".to_string())
        );
        assert_eq!(
            extract_recipe_query("craft ladder"),
            Some("ladder".to_string())
        );
        assert_eq!(extract_recipe_query("craft"), None);
        assert_eq!(extract_recipe_query("how is the weather"), None);
    }

    #[test]
    fn trigger_match_never_splits_multibyte_characters() {
        // U+212A (KELVIN SIGN) lowercases to a plain `k` but is 3 bytes
        // wide, so the remainder must be taken by chars, not byte offset.
        assert_eq!(
            extract_recipe_query("HOW DO I MA\u{212A}E PIE"),
            Some("PIE".to_string())
        );
        assert_eq!(
            extract_recipe_query("RECIPE FOR Torch"),
            Some("Torch".to_string())
        );
    }

    #[tokio::test]
    async fn prefix_match_never_splits_multibyte_characters() {
        let generator = Arc::new(MockGenerator::new());
        let engine = ConversationEngine::new(
            Some(generator.clone() as Arc<dyn TextGenerator>),
            Arc::new(FlatRecipes),
            Arc::new(Mutex::new(ActionMemory::default())),
            Arc::new(Mutex::new(PlayerMemory::default())),
            "k",
            "Suva",
        );

        let reply = engine
            .handle_chat("alice", "\u{212A}ping", Some(5))
            .await
            .unwrap();
        assert_eq!(reply, "Pong, alice! My ping is currently 5ms.");
        assert_eq!(generator.calls(), 0);
    }

    // Minimal session for the proactive loop.
    struct PresenceSession {
        present: Mutex<Vec<String>>,
        sent: Mutex<Vec<String>>,
        connected: AtomicBool,
    }

    impl PresenceSession {
        fn new(present: Vec<String>) -> Arc<Self> {
            Arc::new(Self {
                present: Mutex::new(present),
                sent: Mutex::new(vec![]),
                connected: AtomicBool::new(true),
            })
        }
    }

    #[async_trait]
    impl GameSession for PresenceSession {
        async fn chat(&self, text: &str) -> Result<(), SessionError> {
            self.sent.lock().push(text.to_string());
            Ok(())
        }

        async fn set_movement_state(
            &self,
            _direction: MovementDirection,
            _engaged: bool,
        ) -> Result<(), SessionError> {
            Ok(())
        }

        async fn look(&self, _yaw: f64, _pitch: f64, _force: bool) -> Result<(), SessionError> {
            Ok(())
        }

        fn position(&self) -> Option<Position> {
            None
        }

        fn players_present(&self) -> Vec<String> {
            self.present.lock().clone()
        }

        fn latency_ms(&self) -> Option<u64> {
            None
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn quit(&self, _reason: &str) {}
    }

    fn proactive_config() -> ProactiveConfig {
        ProactiveConfig {
            check_interval: Duration::from_secs(30),
            with_players: Duration::from_secs(600),
            alone: Duration::from_secs(180),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn proactive_remark_fires_after_silence_with_players() {
        let h = harness(true);
        h.generator.push_text("Anyone else hear those cave sounds?");
        let engine = Arc::new(h.engine);
        let session = PresenceSession::new(vec!["alice".to_string()]);
        let cancel = CancellationToken::new();

        let handle = spawn_proactive(
            engine,
            session.clone(),
            proactive_config(),
            cancel.clone(),
        );

        // Under the 10 minute threshold: silence.
        tokio::time::sleep(Duration::from_secs(9 * 60)).await;
        assert!(session.sent.lock().is_empty());

        tokio::time::sleep(Duration::from_secs(2 * 60)).await;
        cancel.cancel();
        let _ = handle.await;

        let sent = session.sent.lock();
        assert_eq!(sent.as_slice(), &["Anyone else hear those cave sounds?"]);
        assert_eq!(h.generator.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn proactive_clock_resets_without_sending_when_alone() {
        let h = harness(true);
        let engine = Arc::new(h.engine);
        let session = PresenceSession::new(vec![]);
        let cancel = CancellationToken::new();

        let handle = spawn_proactive(
            engine,
            session.clone(),
            proactive_config(),
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_secs(20 * 60)).await;
        cancel.cancel();
        let _ = handle.await;

        assert!(session.sent.lock().is_empty());
        assert_eq!(h.generator.calls(), 0);
    }
}
