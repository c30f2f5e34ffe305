use std::env;

use apsess_core::{
    config::SessionConfig, credentials::Credentials, error::Error, item_id::ItemId, session::Session,
};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let track_uri = args
        .get(1)
        .expect("expected a <track_uri> in the first parameter");

    if let Err(err) = run(track_uri) {
        log::error!("{}", err);
        std::process::exit(1);
    }
}

fn run(track_uri: &str) -> Result<(), Error> {
    let login_credentials = Credentials::from_username_and_password(
        env::var("SPOTIFY_USERNAME").expect("SPOTIFY_USERNAME not set"),
        env::var("SPOTIFY_PASSWORD").expect("SPOTIFY_PASSWORD not set"),
    );
    let config = SessionConfig::new(login_credentials)?;
    let session = Session::connect(config)?;

    log::info!("authenticated, country: {:?}", session.get_country_code());

    let item_id = ItemId::from_uri(track_uri).expect("not a valid spotify: uri");
    let hex_id: String = item_id
        .to_raw()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();

    let token = session.token(&["playlist-read"])?;
    match session.api_client().get_metadata("track", &hex_id, &token) {
        Ok(body) => log::info!("fetched {} bytes of track metadata", body.len()),
        Err(err) => log::warn!("metadata fetch failed: {}", err),
    }

    session.close();
    Ok(())
}
