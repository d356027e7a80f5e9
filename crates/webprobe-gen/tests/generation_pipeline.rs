use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use webprobe_core::fakes::ScriptedCompletionModel;
use webprobe_core::{load_test_file, ServiceResult, SpecDefaults, SpecOrigin};
use webprobe_gen::{GenerationClient, GenerationConfig, GenerationError, GitDiffProvider};

fn run_git(repo_dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Repo with two commits: an initial page and a change adding a login form.
fn make_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    run_git(dir.path(), &["init"]);
    run_git(dir.path(), &["config", "user.name", "test-user"]);
    run_git(dir.path(), &["config", "user.email", "test@example.com"]);
    std::fs::write(dir.path().join("index.html"), "<h1>Shop</h1>\n").unwrap();
    run_git(dir.path(), &["add", "."]);
    run_git(dir.path(), &["commit", "-m", "initial"]);
    std::fs::write(
        dir.path().join("index.html"),
        "<h1>Shop</h1>\n<form id=\"login\"><button>Sign in</button></form>\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("logo.png"), [0u8, 159, 146, 150, 0, 1]).unwrap();
    run_git(dir.path(), &["add", "."]);
    run_git(dir.path(), &["commit", "-m", "Add login form"]);
    dir
}

fn config(out: &Path) -> GenerationConfig {
    GenerationConfig {
        api_key: Some("sk-test".to_string()),
        generated_tests_dir: out.join("generated-tests"),
        artifacts_dir: out.join("generation-artifacts"),
        deployment_url: Some("https://preview.example.com".to_string()),
        ..Default::default()
    }
}

async fn client(
    repo: &Path,
    out: &Path,
    responses: Vec<ServiceResult<String>>,
) -> (GenerationClient, Arc<ScriptedCompletionModel>) {
    let model = Arc::new(ScriptedCompletionModel::new(responses));
    let git = GitDiffProvider::open(repo).await.unwrap();
    let client = GenerationClient::new(Arc::new(git), model.clone(), config(out));
    (client, model)
}

const VALID: &str = "```json\n{\"test_cases\": [{\"name\": \"Login: form shows\", \"description\": \"New form\", \"task\": \"1. Open the home page\\n2. Check the Sign in button\", \"expected_output\": \"A Sign in button\"}]}\n```";

#[tokio::test(start_paused = true)]
async fn malformed_twice_then_valid_succeeds_on_third_attempt() {
    let repo = make_repo();
    let out = tempfile::tempdir().unwrap();
    let (client, model) = client(
        repo.path(),
        out.path(),
        vec![
            Ok("{\"test_cases\": [".to_string()),
            Ok("here you go: not json at all".to_string()),
            Ok(VALID.to_string()),
        ],
    )
    .await;

    let outcome = client.generate("HEAD~1", Some("Login launch")).await.unwrap();

    assert_eq!(outcome.attempts, 3);
    assert_eq!(model.calls(), 3);
    assert_eq!(outcome.completion_artifacts.len(), 3);
    assert_eq!(outcome.specs.len(), 1);

    // The prompt carries the diff, the stats, the context and the deployment.
    let prompt = &model.prompts()[0];
    assert!(prompt.contains("Sign in"));
    assert!(prompt.contains("index.html (+1 / -0)"));
    assert!(!prompt.contains("logo.png"));
    assert!(prompt.contains("Login launch"));
    assert!(prompt.contains("https://preview.example.com"));
    assert!(prompt.contains("Add login form"));

    let raw = std::fs::read_to_string(&outcome.diff_artifact).unwrap();
    assert!(raw.contains("+<form id=\"login\">"));
}

#[tokio::test]
async fn identical_revisions_fail_with_empty_diff() {
    let repo = make_repo();
    let out = tempfile::tempdir().unwrap();
    let (client, model) = client(repo.path(), out.path(), vec![Ok(VALID.to_string())]).await;

    let err = client.generate("HEAD..HEAD", None).await.unwrap_err();

    assert!(matches!(err, GenerationError::EmptyDiff { .. }), "got {err:?}");
    assert_eq!(model.calls(), 0);
    assert!(!out.path().join("generated-tests").exists());
}

#[tokio::test]
async fn unknown_reference_is_rejected_before_the_model() {
    let repo = make_repo();
    let out = tempfile::tempdir().unwrap();
    let (client, model) = client(repo.path(), out.path(), vec![]).await;

    let err = client.generate("no-such-branch..HEAD", None).await.unwrap_err();

    assert!(matches!(err, GenerationError::InvalidReference { .. }));
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn generated_file_round_trips_through_the_loader() {
    let repo = make_repo();
    let out = tempfile::tempdir().unwrap();
    let (client, _model) = client(repo.path(), out.path(), vec![Ok(VALID.to_string())]).await;

    let outcome = client.generate("HEAD~1", None).await.unwrap();
    let spec = &outcome.specs[0];
    let SpecOrigin::Generated(Some(path)) = &spec.origin else {
        panic!("generated spec has no file: {:?}", spec.origin);
    };
    assert!(path.file_name().unwrap().to_string_lossy().starts_with("01-login-form-shows"));

    let reloaded = load_test_file(path, &SpecDefaults::default()).unwrap();
    assert_eq!(reloaded.name, "Login: form shows");
    assert_eq!(reloaded.instructions, spec.instructions);
    assert_eq!(
        reloaded.instructions,
        "1. Open the home page\n2. Check the Sign in button"
    );
    assert_eq!(reloaded.expected_output.as_deref(), Some("A Sign in button"));
}
