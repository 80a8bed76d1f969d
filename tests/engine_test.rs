// End-to-end replacement behavior of the token engine

mod common;

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;

use cms_tokens::config::UnresolvedPolicy;
use cms_tokens::error::TokenError;
use cms_tokens::services::{ReplaceOptions, ACCESS_DENIED};

#[tokio::test]
async fn test_escaped_braces_are_literal() {
    let engine = common::engine(common::fixed_clock());
    let ctx = common::post_context(&engine, None);

    let out = engine.replace_tokens("\\{{x}}", &ctx).await.unwrap();
    assert_eq!(out, "{{x}}");

    let out = engine
        .replace_tokens("\\{{entry.title\\}} is {{entry.title}}", &ctx)
        .await
        .unwrap();
    assert_eq!(out, "{{entry.title}} is hello world");
}

#[tokio::test]
async fn test_trailing_backslash_in_value_is_kept() {
    let engine = common::engine(common::fixed_clock());
    let ctx = engine.new_context().with_entry(json!({"p": "C:\\"}));

    let out = engine.replace_tokens("{{entry.p}}{{entry.missing}}", &ctx).await.unwrap();
    assert_eq!(out, "C:\\{{entry.missing}}");
    let out = engine.replace_tokens_sync("{{entry.p}}{{entry.missing}}", &ctx).unwrap();
    assert_eq!(out, "C:\\{{entry.missing}}");

    // Escapes written in the template itself still apply
    let out = engine.replace_tokens("{{entry.p}}\\{{entry.p}}", &ctx).await.unwrap();
    assert_eq!(out, "C:\\{{entry.p}}");
}

#[tokio::test]
async fn test_replacement_is_deterministic() {
    let engine = common::engine(common::fixed_clock());
    let ctx = common::post_context(&engine, Some(common::editor()));
    let template = "{{entry.title | capitalize}} by {{entry.author.name}} at {{system.now}}";

    let first = engine.replace_tokens(template, &ctx).await.unwrap();
    let second = engine.replace_tokens(template, &ctx).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first, "Hello World by Ada Lovelace at 2024-01-15T10:30:00.000Z");
}

#[tokio::test]
async fn test_self_referential_value_terminates() {
    let engine = common::engine(common::fixed_clock());
    let ctx = engine.new_context().with_entry(json!({"a": "{{entry.a}}"}));

    let report = engine
        .replace_tokens_detailed("{{entry.a}}", &ctx, ReplaceOptions::default())
        .await
        .unwrap();
    assert_eq!(report.output, "{{entry.a}}");
    assert!(report.iterations <= 10);
}

#[tokio::test]
async fn test_modifier_order() {
    let engine = common::engine(common::fixed_clock());
    let ctx = engine.new_context().with_value("x", json!("hello"));

    assert_eq!(engine.replace_tokens("{{x | upper | truncate(3)}}", &ctx).await.unwrap(), "HEL");
    assert_eq!(engine.replace_tokens("{{x | truncate(2,\"!\")}}", &ctx).await.unwrap(), "he!");
    assert_eq!(engine.replace_tokens("{{x | truncate(3) | upper}}", &ctx).await.unwrap(), "HEL");
}

#[tokio::test]
async fn test_relation_permission_gate() {
    let engine = common::engine(common::fixed_clock());
    let template = "{{entry.author.name}}";

    let viewer = common::post_context(&engine, Some(common::viewer()));
    assert_eq!(engine.replace_tokens(template, &viewer).await.unwrap(), ACCESS_DENIED);

    let anonymous = common::post_context(&engine, None);
    assert_eq!(engine.replace_tokens(template, &anonymous).await.unwrap(), ACCESS_DENIED);

    let admin = common::post_context(&engine, Some(common::admin()));
    assert_eq!(engine.replace_tokens(template, &admin).await.unwrap(), "Ada Lovelace");

    let editor = common::post_context(&engine, Some(common::editor()));
    assert_eq!(engine.replace_tokens(template, &editor).await.unwrap(), "Ada Lovelace");
}

#[tokio::test]
async fn test_denied_relation_skips_modifiers() {
    let engine = common::engine(common::fixed_clock());
    let viewer = common::post_context(&engine, Some(common::viewer()));

    let report = engine
        .replace_tokens_detailed(
            "{{entry.author.name | truncate(3)}} {{entry.author.name | eq(a, b, c)}}",
            &viewer,
            ReplaceOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(report.output, format!("{} {}", ACCESS_DENIED, ACCESS_DENIED));
    assert_eq!(report.resolved, vec!["entry.author.name"]);

    let editor = common::post_context(&engine, Some(common::editor()));
    assert_eq!(
        engine.replace_tokens("{{entry.author.name | truncate(3)}}", &editor).await.unwrap(),
        "Ada"
    );
}

#[tokio::test]
async fn test_relation_aggregates() {
    let engine = common::engine(common::fixed_clock());
    let ctx = common::post_context(&engine, Some(common::editor()));

    let out = engine
        .replace_tokens("{{entry.reviewers.count}}: {{entry.reviewers.all}} (first {{entry.reviewers.name}})", &ctx)
        .await
        .unwrap();
    assert_eq!(out, "2: Grace Hopper, Alan Turing (first Grace Hopper)");
}

#[tokio::test]
async fn test_sync_mode_leaves_relations_unresolved() {
    let engine = common::engine(common::fixed_clock());
    let ctx = common::post_context(&engine, Some(common::editor()));

    let out = engine.replace_tokens_sync("{{entry.author.name}}", &ctx).unwrap();
    assert_eq!(out, "{{entry.author.name}}");
}

#[tokio::test]
async fn test_user_allow_list() {
    let engine = common::engine(common::fixed_clock());
    let ctx = common::post_context(&engine, Some(common::editor()));

    let out = engine
        .replace_tokens("[{{user.password}}] [{{user.email}}] [{{user.role}}]", &ctx)
        .await
        .unwrap();
    assert_eq!(out, "[] [ed@example.com] [editor]");
}

#[tokio::test]
async fn test_default_modifier() {
    let engine = common::engine(common::fixed_clock());
    let ctx = engine.new_context().with_value("zero", json!(0));

    assert_eq!(engine.replace_tokens("{{missing.field | default(\"N/A\")}}", &ctx).await.unwrap(), "N/A");
    assert_eq!(engine.replace_tokens("{{zero | default(\"N/A\")}}", &ctx).await.unwrap(), "0");
    // Without a chain, the unresolved policy applies instead
    assert_eq!(engine.replace_tokens("{{missing.field}}", &ctx).await.unwrap(), "{{missing.field}}");
}

#[tokio::test]
async fn test_date_modifier() {
    let engine = common::engine(common::fixed_clock());
    let ctx = common::post_context(&engine, None);

    assert_eq!(
        engine.replace_tokens("{{entry.publishedAt | date(\"date\")}}", &ctx).await.unwrap(),
        "2024-01-15"
    );
    assert_eq!(
        engine.replace_tokens("{{entry.publishedAt | date(long)}}", &ctx).await.unwrap(),
        "January 15, 2024"
    );
}

#[tokio::test]
async fn test_relative_dates_follow_context_clock() {
    let clock = common::fixed_clock();
    let engine = common::engine(clock.clone());
    clock.advance(Duration::days(3));
    let ctx = common::post_context(&engine, None);

    let out = engine
        .replace_tokens("{{entry.publishedAt | date(relative)}}", &ctx)
        .await
        .unwrap();
    assert_eq!(out, "3 days ago");
}

#[tokio::test]
async fn test_field_denial_is_unresolved() {
    let engine = common::engine(common::fixed_clock());

    let viewer = common::post_context(&engine, Some(common::viewer()));
    let report = engine
        .replace_tokens_detailed("{{entry.internalNotes}}", &viewer, ReplaceOptions::default())
        .await
        .unwrap();
    assert_eq!(report.output, "{{entry.internalNotes}}");
    assert_eq!(report.failed, vec!["entry.internalNotes"]);

    let editor = common::post_context(&engine, Some(common::editor()));
    assert_eq!(
        engine.replace_tokens("{{entry.internalNotes}}", &editor).await.unwrap(),
        "do not publish"
    );
}

#[tokio::test]
async fn test_strict_mode_errors() {
    let engine = common::engine(common::fixed_clock());
    let ctx = common::post_context(&engine, None);
    let strict = ReplaceOptions::default().with_unresolved(UnresolvedPolicy::Throw);

    let err = engine
        .replace_tokens_with("{{entry.title}} {{entry.nope}}", &ctx, strict)
        .await
        .unwrap_err();
    assert_eq!(err, TokenError::UnresolvedToken("entry.nope".to_string()));

    // A default rescues the token even in strict mode
    let out = engine
        .replace_tokens_with("{{entry.nope | default(x)}}", &ctx, strict)
        .await
        .unwrap();
    assert_eq!(out, "x");
}

#[tokio::test]
async fn test_entry_meta_collection_and_site_tokens() {
    let engine = common::engine(common::fixed_clock());
    let ctx = common::post_context(&engine, None);

    let out = engine
        .replace_tokens(
            "{{entry._id}}/{{entry.status}} in {{collection.label}} on {{site.siteName | slugify}} ({{site.itemsPerPage | add(5)}})",
            &ctx,
        )
        .await
        .unwrap();
    assert_eq!(out, "p1/published in Blog Posts on demo-site (25)");
}

#[tokio::test]
async fn test_unknown_and_failing_modifiers_keep_value() {
    let engine = common::engine(common::fixed_clock());
    let ctx = common::post_context(&engine, None);

    let out = engine
        .replace_tokens("{{entry.title | shout | upper}} {{entry.views | divide(0)}}", &ctx)
        .await
        .unwrap();
    assert_eq!(out, "HELLO WORLD 0");
}

#[tokio::test]
async fn test_huge_precision_keeps_value() {
    let engine = common::engine(common::fixed_clock());
    let ctx = engine.new_context().with_value("x", json!(2.5));

    assert_eq!(engine.replace_tokens("{{x | number(70000)}}", &ctx).await.unwrap(), "2.5");
    assert_eq!(engine.replace_tokens("{{x | round(50000000)}}", &ctx).await.unwrap(), "2.5");
    assert_eq!(engine.replace_tokens_sync("{{x | number(1)}}", &ctx).unwrap(), "2.5");
}

#[tokio::test]
async fn test_system_tokens_use_context_snapshot() {
    let engine = common::engine(common::fixed_clock());
    let ctx = cms_tokens::domain::TokenContext::new(Utc.with_ymd_and_hms(1999, 12, 31, 23, 59, 58).unwrap());

    let out = engine
        .replace_tokens("{{system.date}} {{system.time}} {{system.year | add(1)}}", &ctx)
        .await
        .unwrap();
    assert_eq!(out, "1999-12-31 23:59:58 2000");
}
