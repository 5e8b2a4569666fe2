///  To run :
///  cargo r --example checkout_example
use std::time::Duration;

use checkout_client::CommerceClient;
use checkout_core::application::checkout::Checkout;
use checkout_core::application::gateway::SimulatedGateway;
use checkout_core::config::CheckoutConfig;
use checkout_core::session::{AuthSession, User};
use checkout_sandbox::http::{SandboxServer, SandboxServerConfig};
use checkout_sandbox::InMemoryCommerce;
use checkout_store::build_store;
use checkout_types::domain::address::Address;
use checkout_types::domain::cart::CartLine;
use checkout_types::domain::money::Money;
use checkout_types::domain::order::PaymentMethod;
use checkout_types::domain::payment::CardDetails;
use tempfile::tempdir;

fn find_free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let port = find_free_port();
    let addr = format!("http://127.0.0.1:{port}/");

    let server = SandboxServer::new(
        InMemoryCommerce::new(),
        SandboxServerConfig {
            port: port.to_string(),
        },
    );
    let handle = tokio::spawn(async move {
        server.run().await.expect("server run");
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Sign in through a file-backed session so a second run would restore it.
    let tmp = tempdir()?;
    let session_path = tmp.path().join("session.json");
    let store = build_store(Some(&session_path.display().to_string())).await?;
    let mut auth = AuthSession::restore(store).await?;
    if !auth.is_authenticated() {
        let user = User {
            id: 1,
            name: "Example".into(),
            email: "example@example.com".into(),
        };
        auth.login(user, "example-token".into()).await?;
    }
    let user = auth.user().cloned().expect("signed in");
    let token = auth.token().unwrap_or_default().to_string();

    let laptop = CartLine::new(1, "Laptop", Money::from_decimal(999.99)?, 1);
    reqwest::Client::new()
        .put(format!("{addr}api/cart/{}", user.id))
        .json(&vec![laptop.clone()])
        .send()
        .await?
        .error_for_status()?;

    let client = CommerceClient::builder(&addr)?
        .bearer_auth(&token)?
        .timeout(Duration::from_secs(5))
        .build()?;
    let config = CheckoutConfig {
        settle_delay: Duration::from_millis(200),
        ..CheckoutConfig::default()
    };
    let mut checkout = Checkout::new(client, SimulatedGateway::new(config.settle_delay), config);
    checkout.resume(&auth)?;
    checkout.cart_mut().add(laptop);

    let mut events = checkout.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("[event] {}", event.user_message());
        }
    });

    let address = Address::new("1 Main St", "Springfield", "IL", "62704", "US");
    let placed = checkout.place_order(&address, PaymentMethod::Card).await?;
    println!("Placed order id={} total={}", placed.order_id, placed.total_amount);

    let payment = checkout
        .initiate_payment(placed.order_id, PaymentMethod::Card)
        .await?;
    println!("Initiated payment id={} txn={}", payment.payment_id, payment.transaction_id);

    let card = CardDetails::new("4111111111111111", "12/30", "123", "Example User");
    let outcome = checkout.confirm_payment(&card).await?;
    println!("Payment {} for order {}", outcome.status, outcome.order_id);

    for order in checkout.load_orders().await? {
        println!("Order #{} {} ${}", order.order_id, order.status, order.total_amount);
    }

    drop(checkout);
    let _ = printer.await;
    handle.abort();
    Ok(())
}
