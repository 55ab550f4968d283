use event_assistant::{AssistantSession, DataStore, EventForm, Locale, ProxyClient, SessionState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let base_url = std::env::var("API_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".to_string());
    let prompt = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "A traditional music concert in Sulaymaniyah for next month".to_string());

    let store = DataStore::seeded();
    let (cities, categories) = store.catalog();
    let client = ProxyClient::new(format!("{base_url}/api/generate-event"));

    let mut session = AssistantSession::new(cities, categories);
    session.set_prompt(prompt);

    println!("Asking {} for suggestions...", client.endpoint());
    if let SessionState::Failed(message) = session.submit(&client).await {
        println!("Assistant error: {message}");
        return Ok(());
    }

    if let Some(preview) = session.preview(Locale::En) {
        println!("Title:    {}", preview.title);
        println!("City:     {}", preview.city_name);
        println!("Category: {}", preview.category_name);
        println!("{}", preview.description);
    }

    let mut form = EventForm::new();
    if let Some(data) = session.apply() {
        form.apply_autofill(data);
    }
    match form.to_new_event() {
        Ok(event) => println!("Draft ready: {}", serde_json::to_string_pretty(&event)?),
        Err(missing) => println!("Draft needs more detail: {missing}"),
    }
    Ok(())
}
