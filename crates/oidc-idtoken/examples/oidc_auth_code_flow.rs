//! OpenID Connect Authorization Code Flow with PKCE
//!
//! Walks through the backend side of a login:
//! 1. Discover the provider from its configuration document
//! 2. Build the authorization URL (PKCE challenge, state, nonce)
//! 3. Exchange the returned code and verify the ID token
//!
//! Run with an issuer of your own:
//!
//! ```text
//! OIDC_DISCOVERY_URI=https://idp.example.com/.well-known/openid-configuration \
//! OIDC_CLIENT_ID=... OIDC_CLIENT_SECRET=... \
//! cargo run --example oidc_auth_code_flow -- <code> <verifier> <nonce>
//! ```

use oidc_idtoken::pkce::random_token;
use oidc_idtoken::{AuthorizationRequest, OidcProvider, ProviderConfig, ResourceOwner};

fn env(name: &str) -> Result<String, Box<dyn std::error::Error>> {
    std::env::var(name).map_err(|_| format!("{name} is not set").into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ProviderConfig::new(
        env("OIDC_CLIENT_ID")?,
        env("OIDC_CLIENT_SECRET")?,
        env("OIDC_DISCOVERY_URI")?,
        "http://localhost:8080/callback",
    );

    // Step 1: discovery
    let provider = OidcProvider::discover(config).await?;
    println!("=== OpenID Connect Authorization Code Flow ===\n");
    println!("Issuer:         {}", provider.discovery().issuer);
    println!("Token endpoint: {}\n", provider.discovery().token_endpoint);

    let mut args = std::env::args().skip(1);
    let (Some(code), Some(verifier)) = (args.next(), args.next()) else {
        // Step 2: authorization URL. 43+ characters for the verifier.
        let verifier = format!("{}{}", random_token(), random_token());
        let auth = provider.authorization_url(
            &AuthorizationRequest::new(&verifier).with_scopes(["openid", "offline_access"]),
        )?;

        println!("1. Open in a browser:\n   {}\n", auth.url);
        println!("2. Keep for the callback:");
        println!("   verifier = {verifier}");
        println!("   state    = {}", auth.state);
        println!("   nonce    = {}\n", auth.nonce);
        println!("3. Re-run with: <code> {verifier} {}", auth.nonce);
        return Ok(());
    };

    // Step 3: code exchange and ID token verification
    let identity = match args.next() {
        Some(nonce) => provider.exchange_code_with_nonce(&code, &verifier, &nonce).await?,
        None => provider.exchange_code(&code, &verifier).await?,
    };

    let owner = ResourceOwner::from_identity(&identity);
    println!("Verified with key {}", identity.key_id);
    println!("Subject:  {:?}", identity.subject());
    println!("Merchant: {:?}", owner.id());
    println!(
        "Refresh token issued: {}",
        identity.token.refresh_token.is_some()
    );

    Ok(())
}
