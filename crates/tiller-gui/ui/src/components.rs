mod app_detail;
mod app_form;
mod app_table;
mod modal;

pub use app_detail::AppDetail;
pub use app_form::AppForm;
pub use app_table::AppTable;
pub use modal::{
  ModalComponent,
  ModalHandle
};
