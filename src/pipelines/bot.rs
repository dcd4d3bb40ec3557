//! Conversational-bot deployment pipeline.
//!
//! Mirrors the vendor flow: import the definition, build it, snapshot a
//! version, and point the serving alias at that version. Imports keyed by
//! bot name overwrite the working copy, so the flow needs no replace phase;
//! builds and versioning are asynchronous on the control-plane side, so
//! every mutation is followed by a poll until the bot settles.

use serde_json::{json, Value};

use crate::engine::{
    run_with_retry, wait_until_settled, EngineError, Pipeline, PollPolicy, RetryPolicy,
    StatusClassifier, StepKind,
};
use crate::plane::ControlPlaneClient;

pub const BOT_IMPORTS: &str = "bot-imports";
pub const BOTS: &str = "bots";
pub const BOT_VERSIONS: &str = "bot-versions";
pub const BOT_ALIASES: &str = "bot-aliases";

const IMPORT_IN_PROGRESS: &[&str] = &["IN_PROGRESS"];
const IMPORT_DONE: &[&str] = &["COMPLETE"];
// READY_BASIC_TESTING is a staging state the plane passes through while the
// full build finishes; only READY counts as settled.
const BUILD_IN_PROGRESS: &[&str] = &["BUILDING", "READY_BASIC_TESTING"];
const BUILD_DONE: &[&str] = &["READY"];

/// Deploy a bot definition end to end and return the alias-creation result.
pub fn deploy(
    client: &dyn ControlPlaneClient,
    name: &str,
    definition: &Value,
    alias: &str,
    retry: &RetryPolicy,
    poll: &PollPolicy,
) -> Result<Value, EngineError> {
    let mut pipeline = Pipeline::new();

    pipeline.step("import", StepKind::Action, {
        let definition = definition.clone();
        move |_context| run_with_retry(retry, || client.mutate(BOT_IMPORTS, name, &definition))
    });

    pipeline.step("await-import", StepKind::Poll, move |context| {
        let import_id = context.string("import", "/id")?;
        let settled = wait_until_settled(
            poll,
            &StatusClassifier::settling(IMPORT_IN_PROGRESS, IMPORT_DONE),
            || client.describe(BOT_IMPORTS, &import_id),
        )?;
        Ok(settled.into_body())
    });

    pipeline.step("fetch-bot", StepKind::Action, move |_context| {
        Ok(client.describe(BOTS, name)?.body)
    });

    pipeline.step("build", StepKind::Action, move |context| {
        let payload = build_payload(context.output("fetch-bot")?);
        run_with_retry(retry, || client.mutate(BOTS, name, &payload))
    });

    pipeline.step("await-build", StepKind::Poll, move |_context| {
        let settled = wait_until_settled(
            poll,
            &StatusClassifier::settling(BUILD_IN_PROGRESS, BUILD_DONE),
            || client.describe(BOTS, name),
        )?;
        Ok(settled.into_body())
    });

    pipeline.step("create-version", StepKind::Action, move |context| {
        let checksum = context.string("await-build", "/checksum")?;
        run_with_retry(retry, || {
            client.mutate(BOT_VERSIONS, name, &json!({"checksum": checksum}))
        })
    });

    pipeline.step("await-version", StepKind::Poll, move |_context| {
        let settled = wait_until_settled(
            poll,
            &StatusClassifier::settling(BUILD_IN_PROGRESS, BUILD_DONE),
            || client.describe(BOT_VERSIONS, name),
        )?;
        Ok(settled.into_body())
    });

    pipeline.step("publish-alias", StepKind::Action, move |context| {
        let version = context.string("await-version", "/version")?;
        run_with_retry(retry, || {
            client.mutate(
                BOT_ALIASES,
                alias,
                &json!({"botName": name, "botVersion": version}),
            )
        })
    });

    pipeline.run()
}

/// Turn the fetched working copy into a build request: same definition,
/// with the plane's own bookkeeping fields stripped and the build flag set.
fn build_payload(fetched: &Value) -> Value {
    let mut payload = fetched.clone();
    if let Some(map) = payload.as_object_mut() {
        map.remove("status");
        map.remove("version");
        map.insert("processBehavior".into(), Value::String("BUILD".into()));
    }
    payload
}
