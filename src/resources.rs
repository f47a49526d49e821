// Demo resources served by the binary

use hyper::header::CONTENT_TYPE;

use crate::api::Api;
use crate::routing::Resource;

/// `/ping`: plain-text liveness check
pub fn ping() -> Resource {
    Resource::new("/ping").get(|_, _, res| {
        res.end("pong\n")?;
        Ok(())
    })
}

/// `/hello`: JSON greeting; POST echoes the request body
pub fn hello() -> Resource {
    Resource::new("/hello")
        .get(|_, _, res| {
            res.set_header(CONTENT_TYPE.as_str(), "application/json")?;
            res.end(serde_json::to_string("Hello Stranger!")?)?;
            Ok(())
        })
        .post(|data, _, res| {
            res.set_header(CONTENT_TYPE.as_str(), "application/json")?;
            res.end(serde_json::to_string(&format!(
                "Hello Stranger! Here's your data: {}",
                data.body
            ))?)?;
            Ok(())
        })
}

/// Register every demo resource
#[must_use]
pub fn register(api: Api) -> Api {
    api.add(ping()).add(hello())
}
