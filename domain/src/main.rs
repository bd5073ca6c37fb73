use std::env;
use std::process;
use std::sync::Arc;

use domain::adapters::memory_repo::{InMemoryContentTree, InMemoryPathMapper};
use domain::{
    ContentId, PathCleanup, ResourceDocument, ResourceLocatorStrategy, Scope,
    TreeLeafEditStrategy,
};

const DEMO_WEBSPACE: &str = "demo";

fn print_usage() {
    eprintln!(
        "{}\n\nUsage:\n  domain cleanup <raw> [--locale <locale>]\n  domain validate <path>\n  domain generate <title> [--locale <locale>] [--under <parent-path>]\n\nNotes:\n  - This demo CLI uses an in-memory store; data is not persisted across runs.",
        domain::about()
    );
}

struct Flags {
    locale: String,
    under: Option<String>,
}

fn parse_flags(rest: Vec<String>, allow_under: bool) -> Result<Flags, String> {
    let mut flags = Flags {
        locale: "en".to_string(),
        under: None,
    };
    let mut i = 0;
    while i < rest.len() {
        match rest[i].as_str() {
            "--locale" => {
                if i + 1 >= rest.len() {
                    return Err("--locale requires a value".into());
                }
                flags.locale = rest[i + 1].clone();
                i += 2;
            }
            "--under" if allow_under => {
                if i + 1 >= rest.len() {
                    return Err("--under requires a path".into());
                }
                flags.under = Some(rest[i + 1].clone());
                i += 2;
            }
            unk => return Err(format!("unknown argument: {}", unk)),
        }
    }
    Ok(flags)
}

fn run() -> Result<(), String> {
    let mut args = env::args().skip(1);

    let Some(cmd) = args.next() else {
        print_usage();
        return Ok(());
    };

    match cmd.as_str() {
        "cleanup" => {
            let Some(raw) = args.next() else {
                return Err("missing <raw> for cleanup".into());
            };
            let flags = parse_flags(args.collect(), false)?;
            println!("{}", PathCleanup::default().cleanup(&raw, &flags.locale));
            Ok(())
        }
        "validate" => {
            let Some(path) = args.next() else {
                return Err("missing <path> for validate".into());
            };
            match domain::validate::validate_path(&path) {
                Ok(()) => {
                    println!("valid: {}", path);
                    Ok(())
                }
                Err(e) => Err(e.to_string()),
            }
        }
        "generate" => {
            let Some(title) = args.next() else {
                return Err("missing <title> for generate".into());
            };
            let flags = parse_flags(args.collect(), true)?;
            let scope = Scope::new(DEMO_WEBSPACE, flags.locale.as_str(), None);

            let strategy = TreeLeafEditStrategy::new(
                Arc::new(InMemoryPathMapper::new()),
                Arc::new(InMemoryContentTree::new()),
                PathCleanup::default(),
            );

            let parent = match flags.under {
                Some(path) => {
                    let id = ContentId::new("parent").map_err(|e| e.to_string())?;
                    strategy
                        .save(&ResourceDocument::new(id.clone(), path, scope.clone()), None)
                        .map_err(|e| format!("invalid --under path: {}", e))?;
                    Some(id)
                }
                None => None,
            };

            match strategy.generate(&title, parent.as_ref(), &scope, None) {
                Ok(path) => {
                    println!("{}", path);
                    Ok(())
                }
                Err(e) => Err(format!("generate failed: {}", e)),
            }
        }
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn main() {
    if let Err(msg) = run() {
        eprintln!("error: {}", msg);
        process::exit(1);
    }
}
