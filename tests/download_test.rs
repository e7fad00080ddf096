mod common;

use common::{
    calls_named, record_node, records_page, repository_payload, session, write_article, MockRemote,
};
use parley_sync::sync::PlanGates;
use test_log::test;

const ARTICLES_CATEGORY: [(&str, &str); 1] = [("C_1", "Articles")];

#[test(tokio::test)]
async fn new_remote_record_creates_a_local_article() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let record = record_node(
        "D_1",
        1,
        "Hello World",
        "---\nslug: hello-world\ndescription: Greetings\npublished: 2024-01-02\n---\n# Hello\n\nRemote body.\n",
        &[("L_go", "tag/go"), ("L_s", "series/internals")],
    );
    let remote = MockRemote::new(
        repository_payload(&ARTICLES_CATEGORY, &[]),
        vec![records_page(vec![record], false, None)],
    );
    let session = session(dir.path(), remote);

    let plan = session.prepare_download().await?;
    assert_eq!(plan.creates.len(), 1);
    assert_eq!(plan.creates[0].slug, "hello-world");

    let outcome = session
        .apply_download(&plan, &PlanGates::default())
        .await?;
    assert_eq!(outcome.applied, 1);
    assert_eq!(outcome.failed, 0);

    let written = std::fs::read_to_string(dir.path().join("Hello World.md"))?;
    assert!(written.contains("slug: hello-world"));
    assert!(written.contains("published: 01/02/2024"));
    assert!(written.contains("- go"));
    assert!(written.contains("series: internals"));
    assert!(written.ends_with("# Hello\n\nRemote body.\n"));
    Ok(())
}

#[test(tokio::test)]
async fn matched_pair_pulls_remote_state_without_touching_custom_keys(
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    write_article(
        dir.path(),
        "a.md",
        "---\nslug: a\npublished: 01/01/2024\ncustom: keep\n---\nlocal body\n",
    );
    let record = record_node(
        "D_1",
        1,
        "a",
        "---\nslug: a\ndescription: From remote\npublished: 2024-01-02\n---\nremote body\n",
        &[("L_go", "tag/go")],
    );
    let remote = MockRemote::new(
        repository_payload(&ARTICLES_CATEGORY, &[]),
        vec![records_page(vec![record], false, None)],
    );
    let session = session(dir.path(), remote);

    let plan = session.prepare_download().await?;
    assert_eq!(plan.pairs.len(), 1);
    session.apply_download(&plan, &PlanGates::default()).await?;

    let written = std::fs::read_to_string(dir.path().join("a.md"))?;
    assert!(written.contains("custom: keep"));
    assert!(written.contains("published: 01/02/2024"));
    assert!(written.contains("description: From remote"));
    assert!(written.contains("- go"));
    assert!(written.ends_with("remote body\n"));
    Ok(())
}

#[test(tokio::test)]
async fn content_pull_keeps_the_local_metadata_block_verbatim(
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    // The local block carries a comment that re-serialization would drop.
    write_article(
        dir.path(),
        "a.md",
        "---\nslug: a\n# local editor note\npublished: 01/02/2024\n---\nlocal body\n",
    );
    let record = record_node(
        "D_1",
        1,
        "a",
        "---\nslug: a\npublished: 2024-01-02\n---\nremote body\n",
        &[],
    );
    let remote = MockRemote::new(
        repository_payload(&ARTICLES_CATEGORY, &[]),
        vec![records_page(vec![record], false, None)],
    );
    let session = session(dir.path(), remote);

    let plan = session.prepare_download().await?;
    assert!(plan.pairs[0].frontmatter.is_none());
    session.apply_download(&plan, &PlanGates::default()).await?;

    let written = std::fs::read_to_string(dir.path().join("a.md"))?;
    assert_eq!(
        written,
        "---\nslug: a\n# local editor note\npublished: 01/02/2024\n---\nremote body\n"
    );
    Ok(())
}

#[test(tokio::test)]
async fn rejected_content_gate_applies_frontmatter_only(
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    write_article(
        dir.path(),
        "a.md",
        "---\nslug: a\npublished: 01/01/2024\n---\nlocal body\n",
    );
    let record = record_node(
        "D_1",
        1,
        "a",
        "---\nslug: a\npublished: 2024-01-02\n---\nremote body\n",
        &[],
    );
    let remote = MockRemote::new(
        repository_payload(&ARTICLES_CATEGORY, &[]),
        vec![records_page(vec![record], false, None)],
    );
    let session = session(dir.path(), remote);

    let plan = session.prepare_download().await?;
    let gates = PlanGates {
        content: false,
        ..PlanGates::default()
    };
    session.apply_download(&plan, &gates).await?;

    let written = std::fs::read_to_string(dir.path().join("a.md"))?;
    assert!(written.contains("published: 01/02/2024"));
    assert!(written.ends_with("local body\n"));
    Ok(())
}

#[test(tokio::test)]
async fn missing_category_degrades_to_an_unfiltered_listing(
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let record = record_node(
        "D_1",
        1,
        "Stray",
        "---\nslug: stray\npublished: 2024-01-02\n---\nbody\n",
        &[],
    );
    let remote = MockRemote::new(
        repository_payload(&[("C_9", "General")], &[]),
        vec![records_page(vec![record], false, None)],
    );
    let calls = remote.calls.clone();
    let session = session(dir.path(), remote);

    let plan = session.prepare_download().await?;
    assert_eq!(plan.creates.len(), 1);
    let fetches = calls_named(&calls, "Records");
    assert_eq!(fetches.len(), 1);
    assert!(fetches[0]["categoryId"].is_null());
    Ok(())
}

#[test(tokio::test)]
async fn second_download_run_plans_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let record = record_node(
        "D_1",
        1,
        "Hello World",
        "---\nslug: hello-world\npublished: 2024-01-02\n---\nbody\n",
        &[("L_go", "tag/go")],
    );
    let pages = || vec![records_page(vec![record.clone()], false, None)];

    let remote = MockRemote::new(repository_payload(&ARTICLES_CATEGORY, &[]), pages());
    let session_one = session(dir.path(), remote);
    let plan = session_one.prepare_download().await?;
    session_one.apply_download(&plan, &PlanGates::default()).await?;

    let remote = MockRemote::new(repository_payload(&ARTICLES_CATEGORY, &[]), pages());
    let session_two = session(dir.path(), remote);
    let plan = session_two.prepare_download().await?;
    assert!(plan.is_empty(), "{plan:?}");
    Ok(())
}
