// ABOUTME: Deploy command implementation.
// ABOUTME: Turns CLI source flags into a build source, deploys, and follows detached builds.

use std::sync::Arc;
use std::time::Duration;

use caravel::Platform;
use caravel::engine::BollardEngine;
use caravel::error::{Error, Result};
use caravel::model::{GitRepo, Source};
use caravel::output::Output;
use caravel::types::AppName;

use crate::cli::SourceArgs;

/// How often a detached build's log is polled.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub fn source_from_args(args: SourceArgs) -> Result<Source> {
    let SourceArgs {
        tarball,
        git,
        branch,
        user,
        password,
        definition,
        image,
    } = args;

    match (tarball, git, definition, image) {
        (Some(path), None, None, None) => Ok(Source::Archive(path)),
        (None, Some(repo), None, None) => Ok(Source::Git(GitRepo {
            repo,
            branch: branch.ok_or_else(|| Error::InvalidConfig("--git requires --branch".into()))?,
            user,
            password,
        })),
        (None, None, Some(content), None) => Ok(Source::Descriptor(content)),
        (None, None, None, Some(image)) => Ok(Source::Image(image)),
        _ => Err(Error::InvalidConfig(
            "give exactly one of --tarball, --git, --definition or --image".into(),
        )),
    }
}

pub async fn deploy(
    platform: Arc<Platform<BollardEngine>>,
    app: &AppName,
    source: Source,
    detach: bool,
    mut output: Output,
) -> Result<()> {
    output.start_timer();
    output.progress(&format!("Deploying {} from {}", app, source.kind()));

    let outcome = platform.deploy(app, source, detach).await?;
    let version = outcome.version;
    output.progress(&format!("Reserved version {}", version));

    if detach {
        follow_build(&platform, app, &output).await;
    }

    let image = outcome.wait().await?;
    output.success(&format!("Deployed {} version {} ({})", app, version, image));
    Ok(())
}

/// Print new build log lines until the build stops.
async fn follow_build(platform: &Platform<BollardEngine>, app: &AppName, output: &Output) {
    let mut next_line = 0u64;
    loop {
        let status = platform.get_build_status(app);
        let logs = &status.logs;

        if logs.first_line_number > next_line {
            output.progress(&format!(
                "  ... {} lines skipped",
                logs.first_line_number - next_line
            ));
            next_line = logs.first_line_number;
        }
        for (offset, line) in logs.lines.iter().enumerate() {
            let number = logs.first_line_number + offset as u64;
            if number >= next_line {
                output.log_line(number, line);
                next_line = number + 1;
            }
        }

        if !status.is_app_building {
            break;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
