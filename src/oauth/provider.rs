//! Google consent URL construction.

/// Build the Google authorization URL for the Classroom link flow.
///
/// `access_type=offline` and `prompt=consent` make Google issue a refresh
/// token even when the user has consented before. `state` is echoed back to the
/// redirect URI.
pub fn build_auth_url(
    auth_url: &str,
    client_id: &str,
    redirect_uri: &str,
    scopes: &[String],
    state: &str,
) -> String {
    let scopes = scopes.join(" ");
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&include_granted_scopes=true&state={}",
        auth_url,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(&scopes),
        urlencoding::encode(state)
    )
}
