use gloo::events::EventListener;
use wasm_bindgen::JsCast;
use web_sys::{
  EventTarget,
  KeyboardEvent
};
use yew::{
  Callback,
  ContextProvider,
  Html,
  MouseEvent,
  NodeRef,
  Properties,
  function_component,
  html,
  use_effect_with,
  use_mut_ref,
  use_node_ref
};

/// What a click inside the modal landed
/// on.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum ClickTarget {
  /// The `.modal` overlay itself.
  Overlay,
  /// The `.modal-dialog` frame itself.
  Frame,
  /// Anything nested in the dialog.
  Content
}

impl ClickTarget {
  pub fn dismisses(self) -> bool {
    matches!(
      self,
      Self::Overlay | Self::Frame
    )
  }
}

pub fn is_dismiss_key(key: &str) -> bool {
  matches!(key, "Escape" | "Esc")
}

/// Deferred effects of a destroy. Run
/// after releasing any borrow of the
/// controller: `on_destroy` fires first,
/// then the key subscription is released,
/// then the owner is told to close.
#[must_use]
pub struct Teardown<S> {
  on_destroy:   Option<Callback<()>>,
  subscription: Option<S>,
  on_close:     Callback<()>
}

impl<S> Teardown<S> {
  pub fn run(self) {
    if let Some(on_destroy) =
      self.on_destroy
    {
      on_destroy.emit(());
    }
    drop(self.subscription);
    self.on_close.emit(());
  }
}

/// Lifecycle of one modal instance.
///
/// `S` is the key subscription; dropping
/// it deregisters the listener. At most one
/// subscription is held, and none after
/// destroy.
pub struct ModalController<S> {
  subscription: Option<S>,
  destroyed:    bool,
  on_destroy:   Option<Callback<()>>,
  on_close:     Callback<()>
}

impl<S> ModalController<S> {
  pub fn new(
    on_destroy: Option<Callback<()>>,
    on_close: Callback<()>
  ) -> Self {
    Self {
      subscription: None,
      destroyed: false,
      on_destroy,
      on_close
    }
  }

  pub fn set_callbacks(
    &mut self,
    on_destroy: Option<Callback<()>>,
    on_close: Callback<()>
  ) {
    self.on_destroy = on_destroy;
    self.on_close = on_close;
  }

  pub fn is_mounted(&self) -> bool {
    self.subscription.is_some()
  }

  pub fn is_destroyed(&self) -> bool {
    self.destroyed
  }

  /// Registers the key subscription. A
  /// no-op while already mounted or after
  /// destroy.
  pub fn mount(
    &mut self,
    subscribe: impl FnOnce() -> S
  ) {
    if self.destroyed
      || self.subscription.is_some()
    {
      return;
    }
    self.subscription = Some(subscribe());
  }

  /// Hands back the subscription so the
  /// caller can drop it outside any
  /// borrow. Safe when never mounted.
  pub fn unmount(&mut self) -> Option<S> {
    self.subscription.take()
  }

  pub fn destroy(
    &mut self
  ) -> Option<Teardown<S>> {
    if self.destroyed {
      return None;
    }
    self.destroyed = true;
    Some(Teardown {
      on_destroy:   self.on_destroy.clone(),
      subscription: self.subscription.take(),
      on_close:     self.on_close.clone()
    })
  }

  pub fn key_up(
    &mut self,
    key: &str
  ) -> Option<Teardown<S>> {
    if !self.is_mounted()
      || !is_dismiss_key(key)
    {
      return None;
    }
    self.destroy()
  }

  pub fn click(
    &mut self,
    target: ClickTarget
  ) -> Option<Teardown<S>> {
    if !target.dismisses() {
      return None;
    }
    self.destroy()
  }
}

/// Lets content inside a modal close it.
#[derive(Clone, PartialEq)]
pub struct ModalHandle {
  pub destroy: Callback<()>
}

#[derive(Properties, PartialEq)]
pub struct ModalProps {
  #[prop_or_default]
  pub children:   Html,
  /// Fired once, before the modal tears
  /// down.
  #[prop_or_default]
  pub on_destroy: Option<Callback<()>>,
  /// Asks the owner to drop the modal
  /// from its tree.
  pub on_close:   Callback<()>
}

type Controller =
  ModalController<EventListener>;

/// Classifies a click by comparing its
/// target with the rendered overlay and
/// frame nodes. Unrendered nodes never
/// match.
pub fn classify_target<T: PartialEq>(
  target: Option<&T>,
  overlay: Option<&T>,
  frame: Option<&T>
) -> ClickTarget {
  let is = |node: Option<&T>| {
    matches!(
      (target, node),
      (Some(target), Some(node)) if target == node
    )
  };

  if is(overlay) {
    ClickTarget::Overlay
  } else if is(frame) {
    ClickTarget::Frame
  } else {
    ClickTarget::Content
  }
}

fn classify_click(
  target: Option<&EventTarget>,
  overlay: &NodeRef,
  frame: &NodeRef
) -> ClickTarget {
  let overlay = overlay.get();
  let frame = frame.get();
  classify_target(
    target,
    overlay.as_ref().map(|node| {
      AsRef::<EventTarget>::as_ref(node)
    }),
    frame.as_ref().map(|node| {
      AsRef::<EventTarget>::as_ref(node)
    })
  )
}

#[function_component(ModalComponent)]
pub fn modal_component(
  props: &ModalProps
) -> Html {
  let controller = use_mut_ref(|| {
    Controller::new(
      props.on_destroy.clone(),
      props.on_close.clone()
    )
  });
  controller.borrow_mut().set_callbacks(
    props.on_destroy.clone(),
    props.on_close.clone()
  );

  let overlay_ref = use_node_ref();
  let frame_ref = use_node_ref();

  {
    let controller = controller.clone();
    use_effect_with((), move |_| {
      let handler_controller =
        controller.clone();
      controller.borrow_mut().mount(|| {
        EventListener::new(
          &gloo::utils::document(),
          "keyup",
          move |event| {
            let Some(event) =
              event.dyn_ref::<KeyboardEvent>()
            else {
              return;
            };
            let teardown =
              handler_controller
                .borrow_mut()
                .key_up(&event.key());
            if let Some(teardown) = teardown
            {
              tracing::debug!(
                "modal dismissed by key"
              );
              teardown.run();
            }
          }
        )
      });
      tracing::debug!("modal mounted");

      move || {
        let released =
          controller.borrow_mut().unmount();
        drop(released);
        tracing::debug!("modal unmounted");
      }
    });
  }

  let onclick = {
    let controller = controller.clone();
    let overlay_ref = overlay_ref.clone();
    let frame_ref = frame_ref.clone();
    Callback::from(move |event: MouseEvent| {
      let target = classify_click(
        event.target().as_ref(),
        &overlay_ref,
        &frame_ref
      );
      let teardown =
        controller.borrow_mut().click(target);
      if let Some(teardown) = teardown {
        tracing::debug!(?target, "modal dismissed by click");
        teardown.run();
      }
    })
  };

  let handle = {
    let controller = controller.clone();
    ModalHandle {
      destroy: Callback::from(move |_| {
        let teardown =
          controller.borrow_mut().destroy();
        if let Some(teardown) = teardown {
          teardown.run();
        }
      })
    }
  };

  html! {
      <div class="modal-root">
          <div class="modal" ref={overlay_ref} onclick={onclick}>
              <div class="modal-dialog" ref={frame_ref}>
                  <div class="modal-content">
                      <ContextProvider<ModalHandle> context={handle}>
                          { props.children.clone() }
                      </ContextProvider<ModalHandle>>
                  </div>
              </div>
          </div>
          <div class="modal-backdrop fade in"></div>
      </div>
  }
}
