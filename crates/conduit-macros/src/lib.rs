//! # Conduit Macros
//!
//! The `#[contract]` attribute: registers a trait as a proxiable contract.
//!
//! For a trait `T` it emits the trait unchanged, an `impl Contract for dyn T`
//! carrying the operation table, and an `impl T for Proxy<dyn T>` whose methods
//! hand every call to the proxy's forwarding routine.

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::visit_mut::{self, VisitMut};
use syn::{
    parse_macro_input, FnArg, Ident, ItemTrait, Lifetime, Pat, PatIdent, ReturnType, Signature, TraitItem,
    TraitItemFn, Type, TypeImplTrait,
};

/// Register a trait as a proxiable contract.
///
/// Every method must take `&self`, have no type or const parameters and no
/// `impl Trait` arguments. Arguments, and return values other than the error
/// of a `Result`, must implement `serde::Serialize`. This is a compile-time
/// requirement of every contract, including one only ever proxied without an
/// observer, where nothing is serialized at run time. A method whose return
/// type's last path segment is `Result` is fallible: its `Err` reaches the
/// caller untouched and is not reported to the observer.
///
/// # Example
///
/// ```rust,ignore
/// use conduit_core::contract;
///
/// #[contract]
/// pub trait Calculator: Send + Sync {
///     fn add(&self, a: i32, b: i32) -> i32;
///     fn log(&self, message: String);
///     fn divide(&self, a: i32, b: i32) -> Result<i32, String>;
/// }
/// ```
#[proc_macro_attribute]
pub fn contract(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        let attr: TokenStream2 = attr.into();
        return syn::Error::new_spanned(attr, "#[contract] takes no arguments")
            .to_compile_error()
            .into();
    }

    let input = parse_macro_input!(item as ItemTrait);
    match expand(&input) {
        Ok(output) => output.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

/// One trait method, checked and normalized.
struct Operation {
    method: Ident,
    sig: Signature,
    params: Vec<(Ident, Type)>,
    output: Option<Type>,
    fallible: bool,
}

fn expand(input: &ItemTrait) -> syn::Result<TokenStream2> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "#[contract] traits cannot be generic",
        ));
    }
    if let Some(where_clause) = &input.generics.where_clause {
        return Err(syn::Error::new_spanned(
            where_clause,
            "#[contract] traits cannot have a where clause",
        ));
    }

    let mut operations = Vec::new();
    for item in &input.items {
        match item {
            TraitItem::Fn(method) => operations.push(operation(method)?),
            TraitItem::Type(ty) => {
                return Err(syn::Error::new_spanned(
                    ty,
                    "associated types cannot be forwarded by a proxy",
                ))
            }
            TraitItem::Const(c) => {
                return Err(syn::Error::new_spanned(
                    c,
                    "associated constants cannot be forwarded by a proxy",
                ))
            }
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "unsupported item in a #[contract] trait",
                ))
            }
        }
    }

    let ident = &input.ident;
    let contract_name = ident.unraw().to_string();

    let descriptors = operations.iter().map(|op| {
        let name = op.method.unraw().to_string();
        let params = op.params.iter().map(|(param, ty)| {
            let param = param.unraw().to_string();
            let ty = erase_lifetimes(ty);
            quote! { .param(#param, ::conduit_core::TypeDesc::of::<#ty>()) }
        });
        let returns = match &op.output {
            None => quote! {},
            Some(ty) => {
                let ty = erase_lifetimes(ty);
                if op.fallible {
                    quote! { .returns(::conduit_core::ReturnType::fallible::<#ty>()) }
                } else {
                    quote! { .returns(::conduit_core::ReturnType::of::<#ty>()) }
                }
            }
        };
        quote! {
            .operation(::conduit_core::OperationSig::new(#name) #(#params)* #returns)
        }
    });

    let methods = operations.iter().enumerate().map(|(index, op)| {
        let sig = &op.sig;
        let method = &op.method;
        let names: Vec<&Ident> = op.params.iter().map(|(name, _)| name).collect();
        let entry = if op.fallible {
            quote! { dispatch_fallible }
        } else {
            quote! { dispatch }
        };
        quote! {
            #sig {
                ::conduit_core::Proxy::#entry(
                    self,
                    ::conduit_core::OperationId::new(#index),
                    (#(#names,)*),
                    |__target, (#(#names,)*)| __target.#method(#(#names),*),
                )
            }
        }
    });

    Ok(quote! {
        #input

        impl ::conduit_core::Contract for dyn #ident {
            fn descriptor() -> ::conduit_core::ContractDescriptor {
                ::conduit_core::ContractDescriptor::new(#contract_name)
                    #(#descriptors)*
            }
        }

        impl #ident for ::conduit_core::Proxy<dyn #ident> {
            #(#methods)*
        }
    })
}

fn operation(method: &TraitItemFn) -> syn::Result<Operation> {
    let sig = &method.sig;

    if let Some(asyncness) = &sig.asyncness {
        return Err(syn::Error::new_spanned(asyncness, "async operations are not supported"));
    }
    if let Some(unsafety) = &sig.unsafety {
        return Err(syn::Error::new_spanned(unsafety, "unsafe operations are not supported"));
    }
    if let Some(abi) = &sig.abi {
        return Err(syn::Error::new_spanned(abi, "operations cannot declare an ABI"));
    }
    if let Some(variadic) = &sig.variadic {
        return Err(syn::Error::new_spanned(variadic, "variadic operations are not supported"));
    }
    if let Some(param) = sig
        .generics
        .params
        .iter()
        .find(|p| !matches!(p, syn::GenericParam::Lifetime(_)))
    {
        return Err(syn::Error::new_spanned(
            param,
            "generic operations cannot be forwarded by a proxy",
        ));
    }
    if let Some(where_clause) = &sig.generics.where_clause {
        return Err(syn::Error::new_spanned(
            where_clause,
            "operations cannot have a where clause",
        ));
    }

    match sig.inputs.first() {
        Some(FnArg::Receiver(receiver)) if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        Some(FnArg::Receiver(receiver)) => {
            return Err(syn::Error::new_spanned(receiver, "operations must take `&self`"));
        }
        _ => {
            return Err(syn::Error::new_spanned(
                &sig.ident,
                "operations must take `&self`",
            ));
        }
    }

    let mut normalized = sig.clone();
    let mut params = Vec::new();
    for (index, input) in normalized.inputs.iter_mut().skip(1).enumerate() {
        let FnArg::Typed(typed) = input else {
            return Err(syn::Error::new_spanned(input, "unexpected receiver"));
        };
        if contains_impl_trait(&typed.ty) {
            return Err(syn::Error::new_spanned(
                &typed.ty,
                "`impl Trait` arguments cannot be forwarded by a proxy",
            ));
        }

        let name = match &*typed.pat {
            Pat::Ident(PatIdent {
                ident,
                by_ref: None,
                subpat: None,
                ..
            }) => ident.clone(),
            _ => format_ident!("__arg{}", index),
        };
        typed.pat = Box::new(Pat::Ident(PatIdent {
            attrs: Vec::new(),
            by_ref: None,
            mutability: None,
            ident: name.clone(),
            subpat: None,
        }));
        params.push((name, (*typed.ty).clone()));
    }

    let output = match &sig.output {
        ReturnType::Default => None,
        ReturnType::Type(_, ty) => Some((**ty).clone()),
    };
    let fallible = output.as_ref().is_some_and(is_result);

    Ok(Operation {
        method: sig.ident.clone(),
        sig: normalized,
        params,
        output,
        fallible,
    })
}

fn is_result(ty: &Type) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Result"),
        Type::Group(group) => is_result(&group.elem),
        Type::Paren(paren) => is_result(&paren.elem),
        _ => false,
    }
}

/// Lifetimes of the method signature are not in scope inside `descriptor()`.
struct EraseLifetimes;

impl VisitMut for EraseLifetimes {
    fn visit_lifetime_mut(&mut self, lifetime: &mut Lifetime) {
        *lifetime = Lifetime::new("'static", Span::call_site());
    }
}

fn erase_lifetimes(ty: &Type) -> Type {
    let mut ty = ty.clone();
    EraseLifetimes.visit_type_mut(&mut ty);
    ty
}

#[derive(Default)]
struct FindImplTrait {
    found: bool,
}

impl VisitMut for FindImplTrait {
    fn visit_type_impl_trait_mut(&mut self, node: &mut TypeImplTrait) {
        self.found = true;
        visit_mut::visit_type_impl_trait_mut(self, node);
    }
}

fn contains_impl_trait(ty: &Type) -> bool {
    let mut finder = FindImplTrait::default();
    finder.visit_type_mut(&mut ty.clone());
    finder.found
}
