use mongodb::bson::doc;
use mongodb::{Client, options::ClientOptions};
use std::error::Error;

pub const DATABASE_NAME: &str = "inkpost_db";

pub struct Database {
    pub client: Client,
}

impl Database {
    pub async fn init() -> Result<Self, Box<dyn Error>> {
        let mongodb_uri = std::env::var("MONGODB_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        let mut client_options = ClientOptions::parse(&mongodb_uri).await?;
        client_options.app_name = Some("inkpost-backend".to_string());

        let client = Client::with_options(client_options)?;

        // Ping the server to verify the connection before serving traffic
        client.database("admin").run_command(doc! {"ping": 1}).await?;

        log::info!("Connected successfully to MongoDB");

        Ok(Self { client })
    }
}

pub async fn connect_to_mongo() -> Result<Client, Box<dyn Error>> {
    let database = Database::init().await.map_err(|e| {
        log::error!("Failed to initialize database: {:?}", e);
        e
    })?;
    Ok(database.client)
}
