use clap::{crate_version, App, Arg};
use env_logger::{Builder, Env};
use log::debug;
use std::io::Write;
use std::process;

use ns_relocate::launcher::{self, exit_code_of, LaunchRequest, State};
use ns_relocate::namespace::{NamespaceKind, NamespaceSelection};
use ns_relocate::LaunchError;

fn fail(err: LaunchError) -> ! {
    eprintln!("ns-relocate: {}", err);
    process::exit(i32::from(err.exit_code()));
}

fn init_logger(verbose: bool) {
    let env = Env::default().filter_or("RUST_LOG", if verbose { "debug" } else { "warn" });
    Builder::from_env(env)
        .format(|buf, record| writeln!(buf, "ns-relocate: {}: {}", record.level(), record.args()))
        .init();
}

fn main() {
    // Wait for the supervisor before looking at anything.
    if let Err(err) = launcher::self_pause() {
        fail(err);
    }

    let matches = App::new("ns-relocate")
        .version(crate_version!())
        .about("Run a command in the environment and namespaces of another process")
        .arg(
            Arg::with_name("target")
                .help("PID of the process whose namespaces are joined")
                .short("t")
                .long("target")
                .takes_value(true)
                .value_name("PID"),
        )
        .arg(
            Arg::with_name("command")
                .help("Base64 encoded shell command to run")
                .short("c")
                .long("command")
                .takes_value(true)
                .value_name("BASE64"),
        )
        .arg(
            Arg::with_name("mount")
                .help("join mount namespace")
                .short("m")
                .long("mount"),
        )
        .arg(
            Arg::with_name("pid")
                .help("join PID namespace")
                .short("p")
                .long("pid"),
        )
        .arg(
            Arg::with_name("uts")
                .help("join UTS namespace")
                .short("u")
                .long("uts"),
        )
        .arg(
            Arg::with_name("net")
                .help("join network namespace")
                .short("n")
                .long("net"),
        )
        .arg(
            Arg::with_name("ipc")
                .help("join IPC namespace")
                .short("i")
                .long("ipc"),
        )
        .arg(
            Arg::with_name("env")
                .help("import environment variables of the target")
                .short("e")
                .long("env"),
        )
        .arg(
            Arg::with_name("verbose")
                .help("verbose operation")
                .short("v")
                .long("verbose"),
        )
        .get_matches();

    init_logger(matches.is_present("verbose"));

    let mut namespaces = NamespaceSelection::new();
    namespaces.set(NamespaceKind::Ipc, matches.is_present("ipc"));
    namespaces.set(NamespaceKind::Uts, matches.is_present("uts"));
    namespaces.set(NamespaceKind::Net, matches.is_present("net"));
    namespaces.set(NamespaceKind::Pid, matches.is_present("pid"));
    namespaces.set(NamespaceKind::Mnt, matches.is_present("mount"));

    let request = LaunchRequest::new(
        matches.value_of("target"),
        matches.value_of("command"),
        namespaces,
        matches.is_present("env"),
    )
    .unwrap_or_else(|err| fail(err));
    if namespaces.is_empty() {
        debug!("no namespaces selected, staying in our own");
    } else {
        debug!("relocating into {:?} of {}", namespaces, request.target);
    }

    match launcher::run(&request) {
        Ok(status) => {
            let code = exit_code_of(status);
            debug!("entered {} with code {}", State::Exited, code);
            process::exit(i32::from(code));
        }
        Err(err) => fail(err),
    }
}
