use turnstile_config::TurnstileConfig;
use turnstile_core::TurnstileError;
use turnstile_runtime::{
    ExecCommandParams, ShellResponse, ShellSessionManager, ShellSettings, WriteStdinParams,
};

pub(super) async fn cmd_exec(
    config: TurnstileConfig,
    cmd: String,
    workdir: Option<String>,
    yield_ms: Option<u64>,
    max_tokens: Option<usize>,
    follow: bool,
) -> turnstile_core::Result<()> {
    let manager = ShellSessionManager::new(ShellSettings::from(&config.shell));

    let mut response = manager
        .exec_command(ExecCommandParams {
            workdir,
            yield_time_ms: yield_ms,
            max_output_tokens: max_tokens,
            ..ExecCommandParams::new(cmd)
        })
        .await?;
    print_response(&response)?;

    if follow {
        let context_id = response.context_id;
        while response.status.is_live() {
            let poll = WriteStdinParams {
                context_id,
                chars: String::new(),
                yield_time_ms: yield_ms,
                max_output_tokens: max_tokens,
            };
            let next = match manager.write_stdin(poll).await {
                Ok(next) => next,
                // Exited between polls
                Err(TurnstileError::ShellAlreadyExited { .. }) => {
                    manager.snapshot(context_id, max_tokens)?
                }
                Err(e) => return Err(e),
            };
            if next.page != response.page || next.status != response.status {
                print_response(&next)?;
            }
            response = next;
        }
    }

    manager.shutdown().await;
    Ok(())
}

fn print_response(response: &ShellResponse) -> turnstile_core::Result<()> {
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(())
}
