use anyhow::{Context, bail};
use std::path::{Path, PathBuf};
use std::process::Command;

static EXPECTED_STDOUT_FILE: &str = "expected-stdout";
static EXPECTED_STATUS_FILE: &str = "expected-status";

struct TestCase {
    dir: PathBuf,
    name: String,
    args: String,
    expected_stdout: Option<String>,
    expected_status: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let mut test_cases = Vec::new();
    let mut test_dirs = std::fs::read_dir("golden-tests/tests")
        .context("golden tests root directory not found")?
        .collect::<Result<Vec<_>, _>>()?;
    test_dirs.sort_by_key(|entry| entry.path());
    for entry in test_dirs {
        let path = entry.path();

        if !path.is_dir() {
            println!(
                "skipping path `{}` because it's not a directory",
                path.display()
            );
            continue;
        }

        let args_path = path.join("args");
        let args = std::fs::read_to_string(&args_path)
            .with_context(|| format!("no `args` file found at `{}`", args_path.display()))?;

        let stdout_path = path.join(EXPECTED_STDOUT_FILE);
        let stdout = if stdout_path.is_file() {
            Some(std::fs::read_to_string(&stdout_path).with_context(|| {
                format!(
                    "no `{EXPECTED_STDOUT_FILE}` file found at `{}`",
                    stdout_path.display()
                )
            })?)
        } else {
            None
        };

        let status_path = path.join(EXPECTED_STATUS_FILE);
        let status = if status_path.is_file() {
            Some(std::fs::read_to_string(&status_path).with_context(|| {
                format!(
                    "no `{EXPECTED_STATUS_FILE}` file found at `{}`",
                    status_path.display()
                )
            })?)
        } else {
            None
        };

        test_cases.push(TestCase {
            name: path.display().to_string(),
            dir: path,
            args,
            expected_stdout: stdout,
            expected_status: status,
        })
    }

    let mut errored = false;
    for test_case in test_cases {
        let name = test_case.name.clone();
        if let Err(e) = run_sdn_controller(test_case) {
            println!("Error running golden test `{name}`");
            match e {
                TestError::Internal(e) => println!("{e:?}"),
                TestError::Compare(e) => {
                    if let Some(diff) = e.status_diff {
                        println!("Expected exit status differs from actual exit status:\n{diff}\n");
                    }

                    if let Some(diff) = e.stdout_diff {
                        println!("Expected stdout differs from actual stdout:\n{diff}");
                    }
                }
            }
            errored = true;
        } else {
            println!("{name}: ✅");
        }
    }

    if errored {
        bail!("one or more golden tests failed");
    }

    Ok(())
}

enum TestError {
    Internal(anyhow::Error),
    Compare(CompareError),
}

struct CompareError {
    stdout_diff: Option<String>,
    status_diff: Option<String>,
}

fn run_sdn_controller(test_case: TestCase) -> Result<(), TestError> {
    let controller_args = test_case.args.split_whitespace();
    let command = Command::new("cargo")
        .arg("run")
        .arg("--release")
        .arg("--bin")
        .arg("sdn-controller")
        .arg("--")
        .args(controller_args)
        .env("RUST_LOG", "off")
        .output()
        .context("sdn-controller process crashed")
        .map_err(TestError::Internal)?;

    let stdout = String::from_utf8_lossy(&command.stdout);
    let status = if command.status.success() {
        "success\n"
    } else {
        "failure\n"
    };

    let stdout_diff = compare_or_persist(
        &test_case.dir,
        EXPECTED_STDOUT_FILE,
        test_case.expected_stdout.as_deref(),
        &stdout,
    )?;
    let status_diff = compare_or_persist(
        &test_case.dir,
        EXPECTED_STATUS_FILE,
        test_case.expected_status.as_deref(),
        status,
    )?;

    if stdout_diff.is_some() || status_diff.is_some() {
        Err(TestError::Compare(CompareError {
            stdout_diff,
            status_diff,
        }))
    } else {
        Ok(())
    }
}

/// Diffs the actual output against the expected one, or records it if there is no expectation yet
fn compare_or_persist(
    dir: &Path,
    file_name: &str,
    expected: Option<&str>,
    actual: &str,
) -> Result<Option<String>, TestError> {
    match expected {
        Some(expected) if expected != actual => Ok(Some(diff::diff_to_string(expected, actual))),
        Some(_) => Ok(None),
        None => {
            std::fs::write(dir.join(file_name), actual.as_bytes())
                .with_context(|| format!("failed to persist `{file_name}`"))
                .map_err(TestError::Internal)?;
            Ok(None)
        }
    }
}

mod diff {
    use console::{Style, style};
    use similar::{ChangeTag, TextDiff};
    use std::fmt::{self, Write};

    struct Line(Option<usize>);

    impl fmt::Display for Line {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            match self.0 {
                None => write!(f, "    "),
                Some(idx) => write!(f, "{:<4}", idx + 1),
            }
        }
    }

    pub fn diff_to_string(old: &str, new: &str) -> String {
        let mut output = String::new();
        let diff = TextDiff::from_lines(old, new);

        for (idx, group) in diff.grouped_ops(3).iter().enumerate() {
            if idx > 0 {
                _ = writeln!(output, "{:-^1$}", "-", 80);
            }
            for op in group {
                for change in diff.iter_inline_changes(op) {
                    let (sign, s) = match change.tag() {
                        ChangeTag::Delete => ("-", Style::new().red()),
                        ChangeTag::Insert => ("+", Style::new().green()),
                        ChangeTag::Equal => (" ", Style::new().dim()),
                    };
                    _ = write!(
                        output,
                        "{}{} |{}",
                        style(Line(change.old_index())).dim(),
                        style(Line(change.new_index())).dim(),
                        s.apply_to(sign).bold(),
                    );
                    for (emphasized, value) in change.iter_strings_lossy() {
                        if emphasized {
                            _ = write!(output, "{}", s.apply_to(value).underlined().on_black());
                        } else {
                            _ = write!(output, "{}", s.apply_to(value));
                        }
                    }
                    if change.missing_newline() {
                        _ = writeln!(output);
                    }
                }
            }
        }

        output
    }
}
