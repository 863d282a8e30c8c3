use crate::{
    Context, Destructor, Event, Handle, TypeInfo, TypeTag,
    transport::{PanicTransport, Transport},
};
use core::cell::{Cell, RefCell};
use std::rc::Rc;

/// Throw `handle` and land in the closest handler, as a landing pad would before matching.
pub fn throw_to_handler<R: TypeInfo>(ctx: &mut Context<R>, handle: Handle, ty: Option<TypeTag>) {
    let result = PanicTransport::intercept(|| ctx.throw(handle, ty, None));
    assert_eq!(result.unwrap_err(), handle);
}

pub fn throw_with_destructor<R: TypeInfo>(
    ctx: &mut Context<R>,
    handle: Handle,
    destructor: Box<dyn Destructor>,
) {
    let result = PanicTransport::intercept(|| ctx.throw(handle, None, Some(destructor)));
    assert_eq!(result.unwrap_err(), handle);
}

pub fn counting_destructor() -> (Rc<Cell<usize>>, Box<dyn Destructor>) {
    let count = Rc::new(Cell::new(0));
    let destructor: Box<dyn Destructor> = Box::new({
        let count = Rc::clone(&count);
        move |_: Handle| count.set(count.get() + 1)
    });
    (count, destructor)
}

pub fn handle_recording_destructor() -> (Rc<Cell<Handle>>, Box<dyn Destructor>) {
    let seen = Rc::new(Cell::new(Handle::NULL));
    let destructor: Box<dyn Destructor> = Box::new({
        let seen = Rc::clone(&seen);
        move |handle: Handle| seen.set(handle)
    });
    (seen, destructor)
}

pub fn record_events<R: TypeInfo>(ctx: &mut Context<R>) -> Rc<RefCell<Vec<Event>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    ctx.set_sink({
        let events = Rc::clone(&events);
        move |event: &Event| events.borrow_mut().push(*event)
    });
    events
}
