use versegate::client::Client;
use versegate::domain_model::*;
use versegate::domain_port::{DonationApi, DonationRequest};
use versegate::logger::*;
use versegate::settings::*;

fn scope_from_args(args: &ScopeArgs) -> anyhow::Result<Scope> {
    let scope = Scope {
        kind: args.kind.parse()?,
        lang: args.lang.clone(),
        source: args.source.clone(),
        book_number: args.book,
        chapter: args.chapter,
        verse: args.verse,
    };
    scope.validate()?;
    Ok(scope)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap();

    let project_settings = parse_settings(cli.settings.as_deref())?;
    debug!(?project_settings);
    let logger_config = LogConfig {
        filter: project_settings.log.filter.clone(),
    };
    logger.reload_from_config(&logger_config)?;

    let client = Client::try_new(&project_settings).await?;

    match cli.command {
        Command::Login { email, password } => {
            client.login(&email, &password).await?;
            println!("logged in as {}", email);
        }
        Command::Logout => {
            client.logout().await;
            println!("logged out");
        }
        Command::Status { scope, user } => {
            let scope = scope_from_args(&scope)?;
            let user = user.map(UserId);
            let partner = client.check_status(&scope, user.as_ref()).await?;
            println!("{}", partner);
        }
        Command::Donate {
            scope,
            amount,
            currency,
        } => {
            let scope = scope_from_args(&scope)?;
            let intent = client
                .donations
                .initiate(&DonationRequest {
                    scope,
                    amount,
                    currency,
                })
                .await;
            match intent {
                Ok(intent) => println!("{} {}", intent.payment_id, intent.client_secret),
                Err(versegate::application_port::GatewayError::AuthExpired) => {
                    error!("session expired, run `versegate login` again");
                    std::process::exit(2);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}
