//! Dispatch bridge tests - late-bound calls through a native `IDispatch`.
//!
//! The object under test is exposed once; every call then goes through
//! GetIDsOfNames and Invoke on its vtable, either via `DispatchClient` or by
//! filling DISPPARAMS/EXCEPINFO by hand.
//!
//! Run with: cargo test --test dispatch_test -- --nocapture

use std::ptr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use comity::accessibility::frame_accessible;
use comity::com::object::{self, ComObject, InterfaceEntry};
use comity::com::{
    ComError, IDispatch, Interface, DISP_E_BADINDEX, DISP_E_EXCEPTION, DISP_E_UNKNOWNINTERFACE,
    DISP_E_UNKNOWNNAME, E_NOTIMPL, GUID, S_OK, TYPE_E_LIBNOTREGISTERED,
};
use comity::dispatch::{
    DispParams, DispatchClient, DispatchTableBuilder, Dispatchable, ExcepInfo, InvokeKind,
    RawVariant, Variant, DISPID_PROPERTYPUT, DISPID_UNKNOWN,
};
use comity::window::{ScriptedWindow, WindowLayout};

struct Thermostat {
    temperature: AtomicI32,
    label: Mutex<String>,
}

impl ComObject for Thermostat {
    fn interfaces(&self) -> Vec<InterfaceEntry> {
        vec![InterfaceEntry::of::<IDispatch, Self>()]
    }
}

impl Dispatchable for Thermostat {
    fn register(table: &mut DispatchTableBuilder<Self>) {
        table
            .member("Temperature")
            .getter(|t, _| Ok(Variant::I4(t.temperature.load(Ordering::SeqCst))))
            .setter(|t, _, value| {
                let value = value.as_i32().ok_or(ComError::TypeMismatch { index: 0 })?;
                t.temperature.store(value, Ordering::SeqCst);
                Ok(())
            });
        table
            .member("Label")
            .getter(|t, _| Ok(Variant::Str(t.label.lock().unwrap().clone())))
            .setter(|t, _, value| {
                let text = value.as_str().ok_or(ComError::TypeMismatch { index: 0 })?;
                *t.label.lock().unwrap() = text.to_string();
                Ok(())
            });
        table
            .member("Adjust")
            .parameters(&["delta", "clamp"])
            .method(|t, args| {
                let delta = args.i32(0)?;
                let clamp = match args.get(1) {
                    None => false,
                    Some(Variant::Bool(b)) => *b,
                    Some(_) => return Err(args.mismatch(1)),
                };
                let mut next = t.temperature.load(Ordering::SeqCst) + delta;
                if clamp {
                    next = next.clamp(0, 40);
                }
                t.temperature.store(next, Ordering::SeqCst);
                Ok(Variant::I4(next))
            });
        table
            .member("Calibrate")
            .method(|_, _| Err(ComError::NotImplemented));
    }
}

fn thermostat(temperature: i32) -> (Arc<Thermostat>, DispatchClient) {
    let object = Arc::new(Thermostat {
        temperature: AtomicI32::new(temperature),
        label: Mutex::new("Hall".to_string()),
    });
    let ptr: IDispatch = object::expose_as(object.clone()).unwrap();
    (object, DispatchClient::new(ptr))
}

#[test]
fn test_names_resolve_case_insensitively() {
    println!("\n=== Test: GetIDsOfNames ===");
    let (_, client) = thermostat(20);
    assert_eq!(client.ids_of_names(&["temperature"]), Ok(vec![1]));
    assert_eq!(client.ids_of_names(&["LABEL"]), Ok(vec![2]));
    assert_eq!(client.ids_of_names(&["Adjust", "CLAMP", "delta"]), Ok(vec![3, 1, 0]));
    println!("  [OK] member and parameter ids");
}

#[test]
fn test_unknown_parameter_yields_sentinel() {
    let (_, client) = thermostat(20);
    let (hr, ids) = client.raw_ids_of_names(&["Adjust", "bogus", "delta"]);
    assert_eq!(hr, DISP_E_UNKNOWNNAME);
    assert_eq!(ids, vec![3, DISPID_UNKNOWN, 0]);
    assert_eq!(
        client.ids_of_names(&["Adjust", "bogus"]),
        Ok(vec![3, DISPID_UNKNOWN])
    );
}

#[test]
fn test_unknown_member_name_fails() {
    let (_, client) = thermostat(20);
    assert_eq!(
        client.ids_of_names(&["Humidity"]),
        Err(ComError::UnknownName("Humidity".into()))
    );
}

#[test]
fn test_get_ids_of_names_rejects_foreign_riid() {
    let (_, client) = thermostat(20);
    let ptr = client.as_ptr();
    let name: Vec<u16> = "Temperature".encode_utf16().chain(Some(0)).collect();
    let names = [name.as_ptr()];
    let mut id = 0;
    let foreign = GUID::from_u128(0x1234);
    let hr = unsafe {
        (ptr.vtable().GetIDsOfNames)(ptr.as_raw(), &foreign, names.as_ptr(), 1, 0, &mut id)
    };
    assert_eq!(hr, DISP_E_UNKNOWNINTERFACE);
}

#[test]
fn test_property_get_and_tagged_put() {
    println!("\n=== Test: Property Put ===");
    let (object, client) = thermostat(20);
    assert_eq!(client.get(1, &[]), Ok(Variant::I4(20)));

    client.put(1, &[], Variant::I4(23)).unwrap();
    assert_eq!(object.temperature.load(Ordering::SeqCst), 23);

    client.put(2, &[], Variant::from("Kitchen")).unwrap();
    assert_eq!(client.get(2, &[]), Ok(Variant::Str("Kitchen".into())));
    println!("  [OK] put tagged with DISPID_PROPERTYPUT reaches the setter");
}

#[test]
fn test_untagged_put_is_parameter_not_found() {
    println!("\n=== Test: PROPERTYPUT Footgun ===");
    let (object, client) = thermostat(20);
    let result = client.invoke_raw(1, InvokeKind::PROPERTY_PUT, &[Variant::I4(99)], &[]);
    assert_eq!(result, Err(ComError::ParameterNotFound { index: 0 }));
    assert_eq!(object.temperature.load(Ordering::SeqCst), 20);
    println!("  [OK] untagged value reported as parameter-not-found");
}

#[test]
fn test_tagged_value_on_get_is_rejected() {
    let (_, client) = thermostat(20);
    let result = client.invoke_raw(
        1,
        InvokeKind::PROPERTY_GET,
        &[],
        &[(DISPID_PROPERTYPUT, Variant::I4(1))],
    );
    assert!(matches!(result, Err(ComError::ParameterNotFound { .. })));
}

#[test]
fn test_method_with_positional_and_named_arguments() {
    let (_, client) = thermostat(38);
    assert_eq!(client.call(3, &[Variant::I4(-3)]), Ok(Variant::I4(35)));

    // `clamp` passed by name rather than position.
    let result = client.invoke_raw(
        3,
        InvokeKind::METHOD,
        &[Variant::I4(10)],
        &[(1, Variant::Bool(true))],
    );
    assert_eq!(result, Ok(Variant::I4(40)));

    // An omitted optional argument.
    let result = client.call(3, &[Variant::I4(1), Variant::Missing]);
    assert_eq!(result, Ok(Variant::I4(41)));
}

#[test]
fn test_unknown_member_id_is_member_not_found() {
    let (_, client) = thermostat(20);
    assert_eq!(client.call(999, &[]), Err(ComError::MemberNotFound(999)));
}

#[test]
fn test_type_mismatch_reports_native_index() {
    let (_, client) = thermostat(20);
    // Positional arguments travel reversed, so `delta` sits at native index 1.
    let result = client.call(3, &[Variant::from("hot"), Variant::Bool(false)]);
    assert_eq!(result, Err(ComError::TypeMismatch { index: 1 }));

    let result = client.call(3, &[Variant::I4(1), Variant::I4(7)]);
    assert_eq!(result, Err(ComError::TypeMismatch { index: 0 }));
}

#[test]
fn test_too_many_arguments_is_bad_param_count() {
    let (_, client) = thermostat(20);
    let args = [Variant::I4(1), Variant::Bool(true), Variant::I4(0)];
    assert_eq!(client.call(3, &args), Err(ComError::BadParamCount));
}

#[test]
fn test_implementation_errors_fill_excep_info() {
    println!("\n=== Test: EXCEPINFO ===");
    let (_, client) = thermostat(20);
    let ptr = client.as_ptr();

    let mut params = DispParams::empty();
    let mut result = RawVariant::empty();
    let mut excep = ExcepInfo::default();
    let mut arg_err = 0;
    let hr = unsafe {
        (ptr.vtable().Invoke)(
            ptr.as_raw(),
            4,
            &GUID::zeroed(),
            0,
            InvokeKind::METHOD.0,
            &mut params,
            &mut result,
            &mut excep,
            &mut arg_err,
        )
    };
    assert_eq!(hr, DISP_E_EXCEPTION);
    assert_eq!(excep.scode, E_NOTIMPL.0);
    assert!(excep.description().is_some());
    unsafe { excep.clear() };

    // The client surfaces the underlying status.
    assert_eq!(client.call(4, &[]), Err(ComError::NotImplemented));
    println!("  [OK] DISP_E_EXCEPTION with scode E_NOTIMPL");
}

#[test]
fn test_type_info_is_not_registered() {
    let (_, client) = thermostat(20);
    let ptr = client.as_ptr();
    unsafe {
        let mut count = 7;
        assert_eq!((ptr.vtable().GetTypeInfoCount)(ptr.as_raw(), &mut count), S_OK);
        assert_eq!(count, 0);

        let mut info = ptr::null_mut();
        let hr = (ptr.vtable().GetTypeInfo)(ptr.as_raw(), 0, 0, &mut info);
        assert_eq!(hr, TYPE_E_LIBNOTREGISTERED);
        assert!(info.is_null());

        let hr = (ptr.vtable().GetTypeInfo)(ptr.as_raw(), 1, 0, &mut info);
        assert_eq!(hr, DISP_E_BADINDEX);
    }
}

#[test]
fn test_accessible_members_use_standard_ids() {
    let window = Arc::new(ScriptedWindow::new(WindowLayout::sample()));
    let frame = frame_accessible(window, None);
    let client = DispatchClient::new(object::expose_as(frame).unwrap());

    assert_eq!(
        client.ids_of_names(&["accDoDefaultAction", "varChild"]),
        Ok(vec![-5018, 0])
    );
    assert_eq!(client.ids_of_names(&["accname"]), Ok(vec![-5003]));
    assert_eq!(
        client.ids_of_names(&["accLocation", "pcyHeight", "varChild"]),
        Ok(vec![-5015, 3, 4])
    );

    // Late-bound reads agree with the vtable.
    assert_eq!(client.get(-5001, &[]), Ok(Variant::I4(7)));
    assert_eq!(
        client.get(-5003, &[]),
        Ok(Variant::Str("Untitled - Notes".into()))
    );
}

#[test]
fn test_accessible_member_alone_and_with_unknown_parameter() {
    let window = Arc::new(ScriptedWindow::new(WindowLayout::sample()));
    let frame = frame_accessible(window, None);
    let client = DispatchClient::new(object::expose_as(frame).unwrap());

    assert_eq!(client.ids_of_names(&["accDoDefaultAction"]), Ok(vec![-5018]));

    let (hr, ids) = client.raw_ids_of_names(&["accDoDefaultAction", "bogus"]);
    assert_eq!(hr, DISP_E_UNKNOWNNAME);
    assert_eq!(ids, vec![-5018, DISPID_UNKNOWN]);
}
