use nimbus_audience::{
    Application, BucketStore, Channel, DEFAULT_BUCKET_TOTAL, TargetingConfig, TargetingContext,
    bucket_count, bucket_namespace, randomization_unit,
};

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    let ctx = config.context;
    let expression = match nimbus_audience::compile(&ctx) {
        Ok(expression) => expression,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };

    let channel = ctx.channels.iter().next().copied().unwrap_or(Channel::NoChannel);
    let namespace = bucket_namespace(
        ctx.application,
        channel,
        ctx.targeting_config.slug(),
        ctx.is_rollout,
        config.use_group_id,
    );

    let store = BucketStore::new();
    let count = bucket_count(DEFAULT_BUCKET_TOTAL, config.population_percent);
    let range = store.allocate(
        &namespace,
        randomization_unit(ctx.application, config.use_group_id),
        &ctx.slug,
        count,
        DEFAULT_BUCKET_TOTAL,
    );

    println!("targeting:  {expression}");
    println!("namespace:  {namespace}");
    println!(
        "buckets:    instance {} start {} count {} of {} ({}%)",
        range.instance, range.start, range.count, range.total, config.population_percent
    );
}

struct CliConfig {
    context: TargetingContext,
    population_percent: f64,
    use_group_id: bool,
}

fn parse_args() -> Result<CliConfig, String> {
    let mut context = TargetingContext::new("demo-experiment", Application::Desktop);
    let mut population_percent = 100.0;
    let mut use_group_id = true;
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };
        let mut value = |flag: &str| -> Result<String, String> {
            match &inline {
                Some(v) => Ok(v.clone()),
                None => args.next().ok_or_else(|| format!("error: {flag} expects a value")),
            }
        };

        match flag.as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("nimbus-audience {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--slug" => context.slug = value("--slug")?,
            "--application" | "-a" => {
                let slug = value("--application")?;
                context.application = Application::from_slug(&slug)
                    .ok_or_else(|| format!("error: unknown application '{slug}'"))?;
            }
            "--channel" => {
                let slug = value("--channel")?;
                let channel = Channel::from_slug(&slug)
                    .ok_or_else(|| format!("error: unknown channel '{slug}'"))?;
                context.channels.insert(channel);
            }
            "--min-version" => context.firefox_min_version = value("--min-version")?,
            "--max-version" => context.firefox_max_version = value("--max-version")?,
            "--locale" => context.locales.push(value("--locale")?),
            "--country" => context.countries.push(value("--country")?),
            "--language" => context.languages.push(value("--language")?),
            "--targeting" => {
                let slug = value("--targeting")?;
                context.targeting_config = TargetingConfig::from_slug(&slug)
                    .ok_or_else(|| format!("error: unknown targeting config '{slug}'"))?;
            }
            "--sticky" => context.is_sticky = true,
            "--rollout" => context.is_rollout = true,
            "--population" => {
                let raw = value("--population")?;
                population_percent = raw
                    .parse::<f64>()
                    .ok()
                    .filter(|p| (0.0..=100.0).contains(p))
                    .ok_or_else(|| format!("error: invalid --population '{raw}' (expected 0..=100)"))?;
            }
            "--no-group-id" => use_group_id = false,
            other => return Err(format!("error: unknown option '{other}'\n\n{}", help_text())),
        }
    }

    Ok(CliConfig { context, population_percent, use_group_id })
}

fn help_text() -> String {
    format!(
        "nimbus-audience {version}

Compile a targeting expression and a sample bucket allocation for one
experiment/rollout audience.

Usage:
  nimbus-audience [OPTIONS]

Options:
  --slug <slug>              Experiment slug. Default: demo-experiment
  -a, --application <slug>   firefox-desktop, fenix, ios, focus-android,
                             klar-android, focus-ios, klar-ios.
                             Default: firefox-desktop
  --channel <slug>           Channel restriction; repeatable.
  --min-version <version>    Lower version bound, e.g. 113.!
  --max-version <version>    Upper version bound, e.g. 120.!
  --locale <code>            Locale restriction; repeatable.
  --country <code>           Country restriction; repeatable.
  --language <code>          Language restriction; repeatable.
  --targeting <slug>         Advanced targeting template, e.g. mac_only.
  --sticky                   Keep already-enrolled users matching.
  --rollout                  Treat the entity as a rollout.
  --population <percent>     Population percent for the allocation. Default: 100
  --no-group-id              Bucket on normandy_id instead of group_id.
  -h, --help                 Show this help message.
  -V, --version              Print version information.

Exit codes:
  0  Success.
  1  Compilation error (malformed version, self-reference).
  2  Invalid arguments.
",
        version = env!("CARGO_PKG_VERSION")
    )
}
