//! Flash messages carried across a redirect in a one-shot cookie

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, Cookies};

use crate::services::{Flash, FlashLevel};

pub const FLASH_COOKIE: &str = "filedrop_flash";

/// Queue `flash` for the next rendered page
pub fn set_flash(cookies: &Cookies, flash: &Flash) {
    let cookie = Cookie::build((FLASH_COOKIE, encode(flash)))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    cookies.add(cookie);
}

/// Pop the pending flash message, if any
pub fn take_flash(cookies: &Cookies) -> Option<Flash> {
    let cookie = cookies.get(FLASH_COOKIE)?;
    cookies.remove(Cookie::build(FLASH_COOKIE).path("/").build());
    decode(cookie.value())
}

fn encode(flash: &Flash) -> String {
    URL_SAFE_NO_PAD.encode(format!("{}|{}", flash.level.as_str(), flash.message))
}

fn decode(value: &str) -> Option<Flash> {
    let raw = URL_SAFE_NO_PAD.decode(value).ok()?;
    let raw = String::from_utf8(raw).ok()?;
    let (level, message) = raw.split_once('|')?;

    let level = match level {
        "success" => FlashLevel::Success,
        "error" => FlashLevel::Error,
        _ => return None,
    };

    Some(Flash {
        level,
        message: message.to_string(),
    })
}
