use anyhow::Result;
use clap::{Parser, Subcommand};
use client_core::CatalogSession;
use gateway::{ProductGateway, DEFAULT_API_URL};
use shared::domain::{Product, ProductId};

#[derive(Parser, Debug)]
#[command(about = "Browse the product catalog")]
struct Args {
    #[arg(long, default_value = DEFAULT_API_URL)]
    server_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List products, optionally narrowed by brand and/or a search query.
    Browse {
        #[arg(long)]
        brand: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one product in full.
    Show { id: String },
    /// List the available brands.
    Brands,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let session = CatalogSession::new(ProductGateway::new(args.server_url));
    match args.command {
        Command::Browse { brand, search } => {
            session.initial_load().await;
            if let Some(brand) = &brand {
                session.set_brand(Some(brand)).await;
            }
            if let Some(search) = &search {
                session.set_search(search).await;
            }
            let products = session.products().await;
            if products.is_empty() {
                println!("No products matched.");
            }
            for product in &products {
                print_row(product);
            }
        }
        Command::Show { id } => {
            // Not-found and transport failures arrive as one error kind, and
            // the storefront renders both the same way.
            match session.product_details(&ProductId(id)).await {
                Ok(product) => print_details(&product),
                Err(_) => anyhow::bail!("product not found"),
            }
        }
        Command::Brands => {
            session.initial_load().await;
            for brand in session.brands().await {
                println!("{brand}");
            }
        }
    }
    Ok(())
}

fn print_row(product: &Product) {
    let stock = if product.is_in_stock() { "" } else { "  [out of stock]" };
    println!(
        "{:>6}  {:<40} {:<16} {:>10.2}{stock}",
        product.id, product.name, product.brand, product.price
    );
}

fn print_details(product: &Product) {
    println!("{} ({})", product.name, product.brand);
    println!("  id:          {}", product.id);
    println!("  price:       {:.2}", product.price);
    if let Some(reference) = product.reference_price() {
        println!("  was:         {reference:.2}");
    }
    if let Some(discount) = product.discount {
        println!("  discount:    {discount}%");
    }
    if let Some(rating) = product.rating {
        let reviews = product.review_count.unwrap_or(0);
        println!("  rating:      {rating} ({reviews} reviews)");
    }
    if let Some(article_number) = &product.article_number {
        println!("  article no.: {article_number}");
    }
    if let Some(code) = &product.code {
        println!("  code:        {code}");
    }
    if let Some(country) = &product.country {
        println!("  country:     {country}");
    }
    println!("  in stock:    {}", product.is_in_stock());
    println!();
    println!("{}", product.description);
}
