// Drives the compiled binary through a PTY: pick a session, play one guess,
// then walk back out with Esc.
//
// Requires a pseudo terminal, so it is Unix-only and ignored by default.
// Run with: `cargo test --test integration_min_session -- --ignored`.

#![cfg(unix)]

use std::time::Duration;

use expectrl::{spawn, Eof};

#[test]
#[ignore]
fn guess_then_escape_exits_and_saves() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let bin = assert_cmd::cargo::cargo_bin("retrowordle");
    let cmd = format!(
        "{} --data-dir {} --backend json --config {} --session session-1",
        bin.display(),
        dir.path().display(),
        dir.path().join("config.json").display()
    );

    let mut p = spawn(cmd)?;
    std::thread::sleep(Duration::from_millis(300));

    // level select -> level 1
    p.send("\r")?;
    std::thread::sleep(Duration::from_millis(100));
    p.send("slate\r")?;
    std::thread::sleep(Duration::from_millis(200));

    for _ in 0..3 {
        p.send("\x1b")?;
        std::thread::sleep(Duration::from_millis(150));
    }
    p.expect(Eof)?;

    let saved = std::fs::read_to_string(dir.path().join("currentSession.json"))?;
    assert!(saved.contains("SLATE"));
    let config = std::fs::read_to_string(dir.path().join("config.json"))?;
    assert!(config.contains("session-1"));
    Ok(())
}
