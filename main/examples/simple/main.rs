use std::time::Duration;

use ribot::{prelude::*, select::predicate::Name};

#[derive(Debug)]
pub struct Title {
    url: Url,
    title: String,
}

fn follow(crawler: &Crawler, resp: &Response) {
    if let Some(title) = resp.document().find(Name("title")).next().map(|v| v.text()) {
        let item = Item::new(Title { url: resp.url().clone(), title });
        if let Some(item) = crawler.new_item(item) {
            if let Some(t) = item.downcast_ref::<Title>() {
                println!("- {} {:?} ({})", resp, t.title, t.url);
            }
        }
    }

    for link in resp.links() {
        crawler.submit(Request::from_url(Method::GET, link).with_handler(follow));
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let settings = config::CrawlingSettings::default()
        .with_concurrency(4)
        .with_delay(Duration::from_millis(100), Duration::from_millis(500));
    let networking = settings.networking.clone();
    let crawler = Crawler::new(settings, HyperTransport::new(networking)?)?;

    crawler
        .use_stage(stages::AllowedDomains::new(vec!["example.com"], true))
        .use_stage(stages::HashSetDedup::new())
        .use_stage(stages::TotalBudget::new(50))
        .use_stage(stages::ContentType::new(vec!["text/html", "text/plain"]));

    crawler.get("https://example.com", follow)?;
    crawler.run().await?;

    println!("{}", crawler.stats());
    Ok(())
}
