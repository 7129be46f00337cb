//! Browser glue: the fabric file input.

use anyhow::anyhow;
use wasm_bindgen::{JsCast, prelude::*};
use wasm_bindgen_futures::JsFuture;
use winit::event_loop::EventLoopProxy;

use crate::{
    config::FABRIC_INPUT_ID,
    error::TextureError,
    fabric::FabricSource,
    flow::{ViewerEvent, send},
};

/// Forward every file picked in the `fabricUpload` input to the event loop.
///
/// The pick is sent straight from the change handler, the file is read later.
pub fn listen_for_fabric(proxy: EventLoopProxy<ViewerEvent>) -> anyhow::Result<()> {
    let document = web_sys::window()
        .and_then(|window| window.document())
        .ok_or_else(|| anyhow!("no document"))?;
    let input: web_sys::HtmlInputElement = document
        .get_element_by_id(FABRIC_INPUT_ID)
        .ok_or_else(|| anyhow!("no element with id {FABRIC_INPUT_ID}"))?
        .dyn_into()
        .map_err(|_| anyhow!("#{FABRIC_INPUT_ID} is not an input element"))?;

    let target = input.clone();
    let on_change = Closure::<dyn FnMut(web_sys::Event)>::new(move |_event: web_sys::Event| {
        if let Some(file) = target.files().and_then(|files| files.get(0)) {
            send(&proxy, ViewerEvent::FabricPicked(FabricSource::File(file)));
        }
    });
    input
        .add_event_listener_with_callback("change", on_change.as_ref().unchecked_ref())
        .map_err(|e| anyhow!("could not listen to #{FABRIC_INPUT_ID}: {e:?}"))?;
    // The listener lives as long as the page
    on_change.forget();
    Ok(())
}

/// Read the contents of a picked file.
pub async fn read_file(file: &web_sys::File) -> Result<Vec<u8>, TextureError> {
    let buffer = JsFuture::from(file.array_buffer())
        .await
        .map_err(|e| TextureError::Read(format!("{}: {e:?}", file.name())))?;
    Ok(js_sys::Uint8Array::new(&buffer).to_vec())
}
