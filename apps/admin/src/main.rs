use std::{
    io::{self, Write as _},
    sync::Arc,
};

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use client_core::{AdminSession, DeleteConfirmation, FailureNotifier, SortField};
use gateway::{ProductGateway, DEFAULT_API_URL};
use shared::domain::{Product, ProductDraft, ProductId, ProductPatch};

#[derive(Parser, Debug)]
#[command(about = "Manage the product catalog")]
struct Args {
    #[arg(long, default_value = DEFAULT_API_URL)]
    server_url: String,
}

/// Failed writes surface on the console, not just in the log.
struct ConsoleNotifier;

#[async_trait]
impl FailureNotifier for ConsoleNotifier {
    async fn notify(&self, message: &str) {
        println!("error: {message}");
    }
}

/// Deletes prompt on stdin before anything leaves the process.
struct PromptConfirmation;

#[async_trait]
impl DeleteConfirmation for PromptConfirmation {
    async fn confirm(&self, id: &ProductId) -> bool {
        let prompt = format!("delete product {id}? [y/N] ");
        tokio::task::spawn_blocking(move || {
            let answer = read_line_blocking(&prompt).unwrap_or_default();
            matches!(answer.trim(), "y" | "Y" | "yes")
        })
        .await
        .unwrap_or(false)
    }
}

fn read_line_blocking(prompt: &str) -> io::Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line)
}

async fn read_line(prompt: &str) -> io::Result<String> {
    let prompt = prompt.to_string();
    tokio::task::spawn_blocking(move || read_line_blocking(&prompt))
        .await
        .map_err(io::Error::other)?
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let session = AdminSession::with_dependencies(
        ProductGateway::new(args.server_url),
        Arc::new(ConsoleNotifier),
        Arc::new(PromptConfirmation),
    );
    session.reload().await;
    print_table(&session.visible_products().await);
    println!("type 'help' for commands");

    loop {
        let line = read_line("admin> ").await?;
        if line.is_empty() {
            break; // EOF
        }
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            "" => {}
            "list" => print_table(&session.visible_products().await),
            "search" => {
                session.set_search(rest).await;
                print_table(&session.visible_products().await);
            }
            "sort" => match rest.parse::<SortField>() {
                Ok(field) => {
                    session.sort_by(field).await;
                    print_table(&session.visible_products().await);
                }
                Err(err) => println!("{err}"),
            },
            "add" => {
                if let Some(draft) = prompt_draft().await? {
                    if let Ok(created) = session.create(draft).await {
                        println!("created product {}", created.id);
                        print_table(&session.visible_products().await);
                    }
                }
            }
            "edit" => {
                let (id, overrides) = rest.split_once(' ').unwrap_or((rest, ""));
                if id.is_empty() {
                    println!("usage: edit <id> field=value ...");
                    continue;
                }
                edit_product(&session, id, overrides).await;
            }
            "delete" => {
                if rest.is_empty() {
                    println!("usage: delete <id>");
                    continue;
                }
                match session.delete(&ProductId::from(rest)).await {
                    Ok(true) => print_table(&session.visible_products().await),
                    Ok(false) => println!("delete cancelled"),
                    Err(_) => {}
                }
            }
            "reload" => {
                session.reload().await;
                print_table(&session.visible_products().await);
            }
            "help" => print_help(),
            "quit" | "exit" => break,
            other => println!("unknown command: {other} (try 'help')"),
        }
    }
    Ok(())
}

/// The edit form is pre-filled from the current product; `field=value`
/// overrides are applied on top and the full form is submitted.
async fn edit_product(session: &AdminSession, id: &str, overrides: &str) {
    let id = ProductId::from(id);
    let Some(product) = session
        .products()
        .await
        .into_iter()
        .find(|product| product.id == id)
    else {
        println!("no such product: {id}");
        return;
    };

    let mut form = ProductPatch::from(product);
    for pair in overrides.split_whitespace() {
        let Some((field, value)) = pair.split_once('=') else {
            println!("expected field=value, got '{pair}'");
            return;
        };
        if let Err(err) = apply_override(&mut form, field, value) {
            println!("{err}");
            return;
        }
    }

    if session.update(&id, form).await.is_ok() {
        println!("updated product {id}");
        print_table(&session.visible_products().await);
    }
}

fn apply_override(form: &mut ProductPatch, field: &str, value: &str) -> Result<(), String> {
    let parse_number = |value: &str| {
        value
            .parse::<f64>()
            .map_err(|_| format!("'{value}' is not a number"))
    };
    match field {
        "name" => form.name = Some(value.to_string()),
        "brand" => form.brand = Some(value.to_string()),
        "price" => form.price = Some(parse_number(value)?),
        "originalPrice" | "original_price" => form.original_price = Some(parse_number(value)?),
        "image" => form.image = Some(value.to_string()),
        "description" => form.description = Some(value.to_string()),
        "rating" => form.rating = Some(parse_number(value)?),
        "reviewCount" | "review_count" => {
            form.review_count = Some(
                value
                    .parse()
                    .map_err(|_| format!("'{value}' is not a count"))?,
            );
        }
        "discount" => {
            form.discount = Some(
                value
                    .parse()
                    .map_err(|_| format!("'{value}' is not a percentage"))?,
            );
        }
        "articleNumber" | "article_number" => form.article_number = Some(value.to_string()),
        "country" => form.country = Some(value.to_string()),
        "code" => form.code = Some(value.to_string()),
        "inStock" | "in_stock" => {
            form.in_stock = Some(
                value
                    .parse()
                    .map_err(|_| format!("'{value}' is not true/false"))?,
            );
        }
        other => return Err(format!("unknown field: {other}")),
    }
    Ok(())
}

/// Interactive create form. Name, brand and price are required; everything
/// else may be left blank.
async fn prompt_draft() -> Result<Option<ProductDraft>> {
    let name = read_line("name: ").await?.trim().to_string();
    let brand = read_line("brand: ").await?.trim().to_string();
    let price = read_line("price: ").await?;
    let Ok(price) = price.trim().parse::<f64>() else {
        println!("price must be a number");
        return Ok(None);
    };
    if name.is_empty() || brand.is_empty() {
        println!("name and brand are required");
        return Ok(None);
    }
    let image = read_line("image url: ").await?.trim().to_string();
    let description = read_line("description: ").await?.trim().to_string();

    Ok(Some(ProductDraft {
        name,
        brand,
        price,
        image,
        description,
        original_price: None,
        rating: None,
        review_count: None,
        discount: None,
        article_number: None,
        country: None,
        code: None,
        in_stock: Some(true),
    }))
}

fn print_table(products: &[Product]) {
    println!(
        "{:>6}  {:<40} {:<16} {:>10}  {:>5}",
        "id", "name", "brand", "price", "stock"
    );
    for product in products {
        println!(
            "{:>6}  {:<40} {:<16} {:>10.2}  {:>5}",
            product.id,
            product.name,
            product.brand,
            product.price,
            if product.is_in_stock() { "yes" } else { "no" }
        );
    }
    println!("{} product(s)", products.len());
}

fn print_help() {
    println!("commands:");
    println!("  list                      show the table with the current filter/sort");
    println!("  search <query>            filter rows (blank query clears the filter)");
    println!("  sort <column>             sort by a column; repeat to flip direction");
    println!("  add                       create a product interactively");
    println!("  edit <id> field=value...  update a product");
    println!("  delete <id>               delete a product (asks for confirmation)");
    println!("  reload                    re-fetch the product list");
    println!("  quit                      exit");
}
