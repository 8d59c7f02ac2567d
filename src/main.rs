//! Keyspace Browser - Demo Entry Point
//!
//! Runs the key-space core against the in-memory backend and prints the
//! resulting key tree.

use anyhow::Context;
use keyspace_browser::constants::TOPIC_KEYSPACE_MUTATED;
use keyspace_browser::domain::{BrowserConfig, KeySpaceId, KeyTtl, KeyValue, NewKey};
use keyspace_browser::helpers::init_tracing;
use keyspace_browser::services::{
    BridgeBackend, BridgeOptions, IpcBridge, KeyspaceMutated, MemoryBackend, block_on, spawn_named,
};
use keyspace_browser::states::KeySpaceCache;
use keyspace_browser::views::KeyBrowser;
use std::sync::Arc;

const SAMPLE_KEYS: &[&str] = &[
    "user:1:name",
    "user:1:email",
    "user:2:name",
    "user:2:email",
    "user",
    "session:9f2c",
    "session:1a7e",
    "cache:page:home",
    "cache:page:about",
    "cache:fragment:nav",
    "queue:mail",
    "Counter",
];

fn main() -> anyhow::Result<()> {
    let (config, loaded) = match BrowserConfig::try_load() {
        Ok((config, path)) => (config, Ok(path)),
        Err(e) => (BrowserConfig::default(), Err(e)),
    };

    let _log_guard = init_tracing(&config.log).context("failed to initialize logging")?;
    match loaded {
        Ok(path) => tracing::info!(path = ?path, "Config loaded"),
        Err(e) => tracing::warn!(error = %e, "Failed to load config, using defaults"),
    }
    tracing::info!("Starting Keyspace Browser demo...");

    block_on(run(config))?
}

async fn run(config: BrowserConfig) -> anyhow::Result<()> {
    let (backend, inbound) = MemoryBackend::new();
    backend.seed("local", 0, SAMPLE_KEYS.iter().copied());

    let bridge = IpcBridge::new(
        backend.clone(),
        BridgeOptions {
            invoke_timeout: config.bridge.invoke_timeout(),
        },
    );
    spawn_named("bridge-inbound", bridge.clone().run_inbound(inbound))?;

    let subscription = bridge.on_typed(TOPIC_KEYSPACE_MUTATED, |event: KeyspaceMutated| {
        tracing::info!(
            connection = %event.connection_id,
            db = event.database_index,
            key = %event.key,
            op = ?event.op,
            "Backend reported key mutation"
        );
    });

    let cache = KeySpaceCache::from_config(
        Arc::new(BridgeBackend::new(bridge.clone())),
        &config.keyspace,
    );
    let events = cache.events();
    let space = KeySpaceId::new("local", 0);
    let mut browser = KeyBrowser::from_config(space.clone(), &config.keyspace);

    cache.reload(&space).await.context("reload failed")?;
    cache.load_all(&space).await.context("load all failed")?;

    cache
        .add_key(
            &space,
            NewKey::new("user:3:name", KeyValue::string("carol")).with_ttl(KeyTtl::Seconds(3600)),
        )
        .await
        .context("create failed")?;
    cache
        .update_key(&space, "queue:mail", "queue:email")
        .await
        .context("rename failed")?;
    cache
        .delete_key(&space, "session:1a7e")
        .await
        .context("delete failed")?;

    // A failing call is reported, not fatal
    if let Err(e) = cache.delete_key(&space, "missing").await {
        tracing::warn!(error = %e, "Expected failure");
    }

    for event in events.try_iter() {
        browser.handle_event(&event, &cache);
    }

    let view = browser.view_mut();
    view.expand("group__user");
    view.expand("group__user:3");
    view.expand("group__cache");
    view.handle_selection("user:3:name", false);

    println!("{} ({} keys)", browser.space(), browser.key_count());
    print!("{}", browser.render_text());

    browser.set_keyword("name");
    println!("\nfilter \"{}\":", browser.keyword());
    print!("{}", browser.render_text());

    subscription.unsubscribe();
    bridge.dispose();
    tracing::info!("Keyspace Browser demo finished");
    Ok(())
}
