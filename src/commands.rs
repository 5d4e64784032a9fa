//! Chat-style command handling.
//!
//! [`Dispatcher`] turns one line of user input such as `/dork inurl:admin`
//! into reply messages. It knows nothing about the transport that delivers
//! the line; the `shell` subcommand feeds it stdin, a chat bot would feed it
//! messages.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::info;

use crate::engine::{self, EngineDescriptor};
use crate::ratelimit::{AdminChangeError, AdminGate, RateDecision, RateLimiter};
use crate::search::AttemptOutcome;
use crate::{Retriever, SearchRequest, SearchResult};

/// Results shown per reply; the rest are summarized.
pub const MAX_SHOWN_RESULTS: usize = 10;

const GHDB_URL: &str = "https://www.exploit-db.com/google-hacking-database";

/// Routes commands to the retrieval engine, rate limiter and admin gate.
pub struct Dispatcher {
    retriever: Arc<Retriever>,
    limiter: Arc<RateLimiter>,
    admin: Arc<AdminGate>,
    engines: Mutex<HashMap<u64, &'static EngineDescriptor>>,
}

impl Dispatcher {
    /// Creates a dispatcher over shared services.
    pub fn new(retriever: Arc<Retriever>, limiter: Arc<RateLimiter>, admin: Arc<AdminGate>) -> Self {
        Self {
            retriever,
            limiter,
            admin,
            engines: Mutex::new(HashMap::new()),
        }
    }

    /// The engine `user` has selected, or the default.
    pub fn engine_for(&self, user: u64) -> &'static EngineDescriptor {
        self.engines
            .lock()
            .ok()
            .and_then(|engines| engines.get(&user).copied())
            .unwrap_or_else(engine::default_engine)
    }

    /// Handles one line of input from `user` and returns the replies.
    pub async fn handle(&self, user: u64, line: &str) -> Vec<String> {
        let mut replies = Vec::new();
        self.handle_with(user, line, |reply| replies.push(reply)).await;
        replies
    }

    /// Handles one line of input, passing each reply to `reply` as soon as it
    /// is ready. Progress notices for `/dork` arrive while the search runs.
    pub async fn handle_with<F>(&self, user: u64, line: &str, mut reply: F)
    where
        F: FnMut(String) + Send,
    {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return;
        };
        let args: Vec<&str> = words.collect();

        // Commands may carry a bot suffix, e.g. `/dork@DorkerBot`.
        let command = command.split('@').next().unwrap_or(command);

        match command {
            "/start" => reply(self.start_text()),
            "/help" => reply(self.help_text()),
            "/whoami" => reply(self.whoami(user)),
            "/engine" => reply(self.set_engine(user, &args)),
            "/status" => reply(self.status(user).await),
            "/setadmin" => reply(self.set_admin(user, &args)),
            "/dork" => self.dork(user, &args, &mut reply).await,
            _ => reply("Unknown command. Send /help to see what I can do.".to_string()),
        }
    }

    fn start_text(&self) -> String {
        format!(
            "Welcome to Dorker!\n\n\
             Commands:\n\
             /dork - Perform a dork search\n\
             /whoami - Show your user ID\n\
             /status - Show bot status and rate limits\n\
             Example: /dork intext:password filetype:txt\n\n\
             For more information about dorks, visit: {}",
            GHDB_URL
        )
    }

    fn help_text(&self) -> String {
        format!(
            "Dorker Commands:\n\n\
             /dork [query] - Perform a dork search\n\
             /whoami - Show your user ID\n\
             /status - Show bot status and rate limits\n\
             /setadmin [id] - Set a new admin ID (admin only)\n\
             /engine [name] - Set search engine ({})\n\n\
             Example: /dork intext:password filetype:txt\n\n\
             Common Dork Operators:\n\
             - intext: - Searches for specific text within pages\n\
             - intitle: - Searches for specific text in page titles\n\
             - inurl: - Searches for specific text in URLs\n\
             - filetype: - Searches for specific file types\n\
             - site: - Limits searches to specific sites\n\
             - ext: - Searches for specific file extensions\n\n\
             Rate Limit: {} searches per hour (admin unlimited)\n\n\
             For more information, visit: {}",
            engine::engine_names().join(", "),
            self.limiter.limit(),
            GHDB_URL
        )
    }

    fn admin_line(&self, user: u64) -> &'static str {
        if self.admin.is_admin(user) {
            "You are the admin of this bot."
        } else {
            "You are not an admin of this bot."
        }
    }

    fn whoami(&self, user: u64) -> String {
        format!("Your user ID is: {}\n{}", user, self.admin_line(user))
    }

    fn set_engine(&self, user: u64, args: &[&str]) -> String {
        let names = engine::engine_names();
        let Some(name) = args.first() else {
            let options: String = names.iter().map(|name| format!("- {}\n", name)).collect();
            return format!(
                "Please specify a search engine. Available options:\n{}\nExample: /engine Bing",
                options
            );
        };

        match engine::lookup(name) {
            Some(selected) => {
                if let Ok(mut engines) = self.engines.lock() {
                    engines.insert(user, selected);
                }
                format!("Search engine set to: {}", selected.name)
            }
            None => format!(
                "Invalid search engine. Available options: {}",
                names.join(", ")
            ),
        }
    }

    async fn status(&self, user: u64) -> String {
        let is_admin = self.admin.is_admin(user);
        let usage = self.limiter.usage(&user.to_string()).await;

        let remaining = if is_admin {
            "Unlimited".to_string()
        } else {
            usage.remaining.to_string()
        };
        let reset = match usage.resets_in {
            Some(left) if !is_admin => format_minutes(left),
            _ => "N/A".to_string(),
        };

        format!(
            "Bot Status:\n\n\
             Your ID: {}\n\
             {}\n\n\
             Rate Limit: {} searches per hour\n\
             Searches used: {}\n\
             Searches remaining: {}\n\
             Time until reset: {}\n\n\
             Current search engine: {}",
            user,
            self.admin_line(user),
            self.limiter.limit(),
            usage.used,
            remaining,
            reset,
            self.engine_for(user).name
        )
    }

    fn set_admin(&self, user: u64, args: &[&str]) -> String {
        if self.admin.admin_id().is_some() && !self.admin.is_admin(user) {
            return "Only the current admin can change the admin ID.".to_string();
        }

        let Some(raw) = args.first() else {
            return "Please provide a user ID. Example: /setadmin 123456789".to_string();
        };
        let Ok(new_admin) = raw.parse::<u64>() else {
            return "Invalid user ID. Please provide a numeric ID.".to_string();
        };

        match self.admin.set_admin(user, new_admin) {
            Ok(()) => {
                info!("Admin ID changed to {} by {}", new_admin, user);
                format!(
                    "Admin ID set to {} for this session.\n\n\
                     To make this permanent, set ADMIN_ID={} in your environment.",
                    new_admin, new_admin
                )
            }
            Err(AdminChangeError::NotAdmin) => {
                "Only the current admin can change the admin ID.".to_string()
            }
        }
    }

    async fn dork<F>(&self, user: u64, args: &[&str], reply: &mut F)
    where
        F: FnMut(String) + Send,
    {
        if !self.admin.permits(user) {
            reply("Sorry, this command is restricted to admin only.".to_string());
            return;
        }

        if args.is_empty() {
            reply(
                "Please provide a dork query. Example: /dork intext:password filetype:txt"
                    .to_string(),
            );
            return;
        }

        let is_admin = self.admin.is_admin(user);
        if let RateDecision::Denied { retry_after } = self
            .limiter
            .check_and_record(&user.to_string(), is_admin)
            .await
        {
            reply(format!(
                "Rate limit exceeded. You can make {} searches per hour.\n\
                 Please try again in {}.",
                self.limiter.limit(),
                format_minutes(retry_after)
            ));
            return;
        }

        let query = args.join(" ");
        let engine = self.engine_for(user);
        info!("User {} searching {} for: {}", user, engine.name, query);

        reply(format!(
            "Searching for: {}\nUsing engine: {}\nPlease wait...",
            query, engine.name
        ));

        let strategies = self.retriever.strategy_count();
        let mut finished = 0;
        let retrieval = self
            .retriever
            .retrieve_observed(
                &SearchRequest::new(query.as_str(), engine.name),
                |attempt| {
                    finished += 1;
                    let found = matches!(attempt.outcome, AttemptOutcome::Found(_));
                    if !found && finished < strategies {
                        reply("First method failed, trying alternative method...".to_string());
                    }
                },
            )
            .await;

        if retrieval.results.is_empty() {
            reply(format!(
                "No results found for: {} using {}.\n\
                 The search engine might be blocking the request.\n\
                 Try using a different search engine with: /engine {}",
                query,
                engine.name,
                engine.alternate().name
            ));
        } else {
            reply(format_results(&query, engine.name, &retrieval.results));
        }
    }
}

/// Formats results as a numbered list of at most [`MAX_SHOWN_RESULTS`] entries.
pub fn format_results(query: &str, engine: &str, results: &[SearchResult]) -> String {
    let mut message = format!("Results for: {}\nEngine: {}\n\n", query, engine);

    for (i, result) in results.iter().take(MAX_SHOWN_RESULTS).enumerate() {
        message.push_str(&format!("{}. {}\n{}\n\n", i + 1, result.title, result.link));
    }

    if results.len() > MAX_SHOWN_RESULTS {
        message.push_str(&format!(
            "\nShowing {} of {} results.",
            MAX_SHOWN_RESULTS,
            results.len()
        ));
    }

    message
}

fn format_minutes(duration: Duration) -> String {
    format!("{} minutes", duration.as_secs() / 60)
}
